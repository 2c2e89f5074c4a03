//! Request payloads and response layouts of the Ethereum app instructions.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::bip32::Bip32Path;
use crate::error::EncodingError;

/// Decoded `GET_CONFIGURATION` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfiguration {
    pub arbitrary_data_enabled: bool,
    pub erc20_provisioning_necessary: bool,
    pub stark_enabled: bool,
    pub stark_v2_supported: bool,
    pub version: String,
}

impl AppConfiguration {
    const FLAG_ARBITRARY_DATA: u8 = 0x01;
    const FLAG_ERC20_PROVISIONING: u8 = 0x02;
    const FLAG_STARK: u8 = 0x04;
    const FLAG_STARK_V2: u8 = 0x08;

    pub fn from_response(data: &[u8]) -> Result<Self, EncodingError> {
        if data.len() < 4 {
            return Err(EncodingError::ResponseTooShort {
                expected: 4,
                actual: data.len(),
            });
        }
        let flags = data[0];
        Ok(AppConfiguration {
            arbitrary_data_enabled: flags & Self::FLAG_ARBITRARY_DATA != 0,
            erc20_provisioning_necessary: flags & Self::FLAG_ERC20_PROVISIONING != 0,
            stark_enabled: flags & Self::FLAG_STARK != 0,
            stark_v2_supported: flags & Self::FLAG_STARK_V2 != 0,
            version: format!("{}.{}.{}", data[1], data[2], data[3]),
        })
    }
}

/// Public key, address and optional chain code of a derived account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub public_key: Vec<u8>,
    pub address: Address,
    pub chain_code: Option<[u8; 32]>,
}

impl AddressInfo {
    /// Parses `pkLen || pk || addrLen || addr (ASCII hex) || [chainCode (32)]`.
    pub fn from_response(data: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = Reader::new(data);
        let pk_len = reader.u8()? as usize;
        let public_key = reader.take(pk_len)?.to_vec();
        let addr_len = reader.u8()? as usize;
        let addr_hex = core::str::from_utf8(reader.take(addr_len)?)
            .map_err(|_| EncodingError::InvalidUtf8("address"))?;
        let address: Address = addr_hex.parse()?;
        let chain_code = match reader.remaining() {
            0 => None,
            _ => {
                let mut code = [0u8; 32];
                code.copy_from_slice(reader.take(32)?);
                Some(code)
            }
        };
        Ok(AddressInfo {
            public_key,
            address,
            chain_code,
        })
    }
}

pub fn get_address_request(path: &Bip32Path, chain_id: Option<u64>) -> Result<Vec<u8>, EncodingError> {
    let mut out = path.serialize()?;
    if let Some(chain_id) = chain_id.filter(|&id| id > 0) {
        out.extend_from_slice(&chain_id.to_be_bytes());
    }
    Ok(out)
}

pub fn sign_transaction_request(path: &Bip32Path, raw_tx: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let mut out = path.serialize()?;
    out.extend_from_slice(raw_tx);
    Ok(out)
}

pub fn personal_message_request(path: &Bip32Path, message: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let len = u32::try_from(message.len()).map_err(|_| EncodingError::FieldTooLong {
        field: "personal message",
        len: message.len(),
        max: u32::MAX as usize,
    })?;
    let mut out = path.serialize()?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(message);
    Ok(out)
}

pub fn eip712_hashed_request(
    path: &Bip32Path,
    domain_hash: &[u8],
    message_hash: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    for (field, hash) in [("domain hash", domain_hash), ("message hash", message_hash)] {
        if hash.len() != 32 {
            return Err(EncodingError::InvalidLength {
                field,
                expected: 32,
                actual: hash.len(),
            });
        }
    }
    let mut out = path.serialize()?;
    out.extend_from_slice(domain_hash);
    out.extend_from_slice(message_hash);
    Ok(out)
}

pub fn privacy_shared_secret_request(
    path: &Bip32Path,
    remote_public_key: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    let mut out = path.serialize()?;
    out.extend_from_slice(remote_public_key);
    Ok(out)
}

/// Cursor over a response buffer with bounds-checked reads.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], EncodingError> {
        if self.remaining() < n {
            return Err(EncodingError::ResponseTooShort {
                expected: self.pos + n,
                actual: self.data.len(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, EncodingError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32_be(&mut self) -> Result<u32, EncodingError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
