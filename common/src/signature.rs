use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// ECDSA signature as returned by the signing instructions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Recovery value. Legacy transactions carry the full EIP-155 value.
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Signature {
    /// Parses `v (1) || r (32) || s (32)`. Trailing bytes are ignored.
    pub fn from_response(data: &[u8]) -> Result<Self, EncodingError> {
        if data.len() < 65 {
            return Err(EncodingError::ResponseTooShort {
                expected: 65,
                actual: data.len(),
            });
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&data[1..33]);
        s.copy_from_slice(&data[33..65]);
        Ok(Signature {
            v: data[0] as u64,
            r,
            s,
        })
    }

    /// The 65-byte `r || s || v` form, with `v` reduced to its low byte.
    pub fn to_rsv(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v as u8;
        out
    }
}

/// Rebuilds the EIP-155 `v` for a legacy transaction.
///
/// The device only returns one byte. When `chain_id * 2 + 35 + 1` does not
/// fit, the returned byte is the low byte of the value computed from the
/// chain id shifted right by 32 bits, so the parity is recovered as a
/// modular difference and added back onto the full value.
pub fn recover_legacy_v(v: u8, chain_id: u64) -> u64 {
    let base = chain_id.saturating_mul(2).saturating_add(35);
    if base.saturating_add(1) <= 255 {
        return v as u64;
    }
    let truncated = chain_id >> 32;
    let lowest = (truncated.wrapping_mul(2).wrapping_add(35) % 256) as u8;
    let parity = v.wrapping_sub(lowest);
    base.saturating_add(parity as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(v: u8) -> Vec<u8> {
        let mut data = vec![v];
        data.extend_from_slice(&[0x11; 32]);
        data.extend_from_slice(&[0x22; 32]);
        data
    }

    #[test]
    fn test_from_response() {
        let sig = Signature::from_response(&response(0x1b)).unwrap();
        assert_eq!(sig.v, 27);
        assert_eq!(sig.r, [0x11; 32]);
        assert_eq!(sig.s, [0x22; 32]);
        assert_eq!(sig.to_rsv()[64], 0x1b);
    }

    #[test]
    fn test_from_response_too_short() {
        assert!(matches!(
            Signature::from_response(&[0u8; 64]),
            Err(EncodingError::ResponseTooShort { expected: 65, actual: 64 })
        ));
    }

    #[test]
    fn test_small_chain_id_keeps_v() {
        assert_eq!(recover_legacy_v(37, 1), 37);
        assert_eq!(recover_legacy_v(38, 1), 38);
        // 109 * 2 + 35 + 1 == 254
        assert_eq!(recover_legacy_v(0xfe, 109), 0xfe);
    }

    #[test]
    fn test_large_chain_id_recovers_parity() {
        // polygon: 137 * 2 + 35 == 309
        assert_eq!(recover_legacy_v(35, 137), 309);
        assert_eq!(recover_legacy_v(36, 137), 310);
        assert_eq!(recover_legacy_v(35, 110), 255);
    }

    #[test]
    fn test_parity_wraps_around_byte() {
        // (2^32 * 110) >> 32 == 110, 110 * 2 + 35 == 255
        let chain_id = 110u64 << 32;
        assert_eq!(recover_legacy_v(0xff, chain_id), chain_id * 2 + 35);
        assert_eq!(recover_legacy_v(0x00, chain_id), chain_id * 2 + 36);
    }

    #[test]
    fn test_signature_serde() {
        let sig = Signature::from_response(&response(0x1c)).unwrap();
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
