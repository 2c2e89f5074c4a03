//! BIP-32 derivation paths and their wire form.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// Bit marking a hardened derivation index.
pub const HARDENED: u32 = 0x8000_0000;

/// BIP32 derivation path.
///
/// Hardened indices have the 0x80000000 bit set. The wire form is a count
/// byte followed by each index as a big-endian u32.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Bip32Path(pub Vec<u32>);

impl Bip32Path {
    pub fn from_slice(path: &[u32]) -> Self {
        Self(path.to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Size of the serialized path: `1 + 4 * depth`.
    pub fn encoded_len(&self) -> usize {
        1 + 4 * self.0.len()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, EncodingError> {
        let count = u8::try_from(self.0.len()).map_err(|_| EncodingError::FieldTooLong {
            field: "BIP-32 path",
            len: self.0.len(),
            max: u8::MAX as usize,
        })?;
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(count);
        for index in &self.0 {
            out.extend_from_slice(&index.to_be_bytes());
        }
        Ok(out)
    }
}

impl FromStr for Bip32Path {
    type Err = EncodingError;

    /// Parses `m/44'/60'/0'/0/0`. The leading `m` or `m'` is optional.
    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let mut parts = path.split('/').peekable();
        if matches!(parts.peek(), Some(&"m") | Some(&"m'")) {
            parts.next();
        }

        let invalid = |component: &str| EncodingError::InvalidBip32Path {
            path: path.to_string(),
            component: component.to_string(),
        };

        let mut indices = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(part));
            }
            let index: u32 = digits.parse().map_err(|_| invalid(part))?;
            if index & HARDENED != 0 {
                return Err(invalid(part));
            }
            indices.push(if hardened { index | HARDENED } else { index });
        }
        if indices.len() > u8::MAX as usize {
            return Err(EncodingError::FieldTooLong {
                field: "BIP-32 path",
                len: indices.len(),
                max: u8::MAX as usize,
            });
        }
        Ok(Bip32Path(indices))
    }
}

impl fmt::Display for Bip32Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}

/// Parses and serializes a textual path in one step.
pub fn encode_bip32_path(path: &str) -> Result<Vec<u8>, EncodingError> {
    path.parse::<Bip32Path>()?.serialize()
}
