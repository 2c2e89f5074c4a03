//! Just enough transaction parsing to drive chunked signing.

use crate::address::Address;
use crate::error::EncodingError;
use crate::rlp::{self, RlpItem};

/// Envelope type of a serialized transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TxType {
    Legacy = 0x00,
    AccessList = 0x01,
    DynamicFee = 0x02,
    Blob = 0x03,
}

impl TxType {
    /// Blob transactions are recognized but the device cannot sign them.
    pub fn is_supported(self) -> bool {
        !matches!(self, TxType::Blob)
    }

    /// Positions of `(chain_id, to, data)` in the field list.
    fn field_indices(self) -> (usize, usize, usize) {
        match self {
            TxType::Legacy => (6, 3, 5),
            TxType::AccessList => (0, 4, 6),
            TxType::DynamicFee | TxType::Blob => (0, 5, 7),
        }
    }
}

/// Fields pulled out of a raw transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInfo {
    pub tx_type: TxType,
    pub chain_id: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Vec<u8>,
    /// Byte offset of the chain-id field inside the raw transaction. Only
    /// set for EIP-155 legacy transactions.
    pub chain_id_offset: Option<usize>,
}

impl TxInfo {
    pub fn decode(raw: &[u8]) -> Result<Self, EncodingError> {
        let first = *raw
            .first()
            .ok_or(EncodingError::MalformedTransaction("empty transaction"))?;
        let (tx_type, body) = match first {
            0x01 => (TxType::AccessList, &raw[1..]),
            0x02 => (TxType::DynamicFee, &raw[1..]),
            0x03 => (TxType::Blob, &raw[1..]),
            0xc0..=0xff => (TxType::Legacy, raw),
            other => return Err(EncodingError::UnsupportedTxType(other)),
        };

        let item = rlp::decode_exact(body)?;
        let fields = item
            .as_list()
            .ok_or(EncodingError::MalformedTransaction("transaction is not a list"))?;

        let (chain_idx, to_idx, data_idx) = tx_type.field_indices();
        if fields.len() <= data_idx {
            return Err(EncodingError::MalformedTransaction("too few fields"));
        }

        let data = fields[data_idx]
            .as_bytes()
            .ok_or(EncodingError::MalformedTransaction("data is not a string"))?
            .to_vec();

        let to_bytes = fields[to_idx]
            .as_bytes()
            .ok_or(EncodingError::MalformedTransaction("recipient is not a string"))?;
        let to = if to_bytes.is_empty() {
            None
        } else {
            Some(Address::try_from(to_bytes)?)
        };

        let (chain_id, chain_id_offset) = if tx_type == TxType::Legacy {
            if fields.len() > 6 {
                // EIP-155: chain id is the first of the three trailing fields
                let tail: usize = fields[fields.len() - 3..]
                    .iter()
                    .map(RlpItem::encoded_len)
                    .sum();
                let offset = raw
                    .len()
                    .checked_sub(tail)
                    .ok_or(EncodingError::MalformedTransaction("inconsistent field lengths"))?;
                (chain_id_of(&fields[chain_idx])?, Some(offset))
            } else {
                (1, None)
            }
        } else {
            (chain_id_of(&fields[chain_idx])?, None)
        };

        Ok(TxInfo {
            tx_type,
            chain_id,
            to,
            data,
            chain_id_offset,
        })
    }
}

fn chain_id_of(item: &RlpItem) -> Result<u64, EncodingError> {
    item.as_u64()
        .ok_or(EncodingError::MalformedTransaction("chain id is not a 64-bit integer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn legacy_tx(chain_id: &[u8]) -> Vec<u8> {
        let mut body = vec![0x01, 0x01, 0x82, 0x52, 0x08, 0x94];
        body.extend_from_slice(&[0x11; 20]);
        body.push(0x80); // value
        body.extend_from_slice(&[0x82, 0xca, 0xfe]); // data
        body.extend_from_slice(chain_id);
        let mut raw = vec![0xc0 + body.len() as u8];
        raw.extend(body);
        raw
    }

    #[test]
    fn test_decode_eip155_legacy() {
        let raw = legacy_tx(&hex!("01 80 80"));
        let info = TxInfo::decode(&raw).unwrap();
        assert_eq!(info.tx_type, TxType::Legacy);
        assert_eq!(info.chain_id, 1);
        assert_eq!(info.to, Some(Address([0x11; 20])));
        assert_eq!(info.data, hex!("cafe"));
        assert_eq!(info.chain_id_offset, Some(raw.len() - 3));
        assert_eq!(raw[raw.len() - 3], 0x01);
    }

    #[test]
    fn test_decode_pre_eip155_legacy() {
        let info = TxInfo::decode(&legacy_tx(&[])).unwrap();
        assert_eq!(info.chain_id, 1);
        assert_eq!(info.chain_id_offset, None);
    }

    #[test]
    fn test_decode_legacy_multibyte_chain_id() {
        let raw = legacy_tx(&hex!("820539 80 80"));
        let info = TxInfo::decode(&raw).unwrap();
        assert_eq!(info.chain_id, 1337);
        assert_eq!(raw[info.chain_id_offset.unwrap()], 0x82);
    }

    #[test]
    fn test_decode_dynamic_fee() {
        // chainId, nonce, tip, maxFee, gas, to, value, data, accessList
        let mut body = vec![0x05, 0x80, 0x01, 0x02, 0x03, 0x94];
        body.extend_from_slice(&[0x22; 20]);
        body.extend_from_slice(&[0x80, 0x81, 0xff, 0xc0]);
        let mut raw = vec![0x02, 0xc0 + body.len() as u8];
        raw.extend(body);

        let info = TxInfo::decode(&raw).unwrap();
        assert_eq!(info.tx_type, TxType::DynamicFee);
        assert_eq!(info.chain_id, 5);
        assert_eq!(info.to, Some(Address([0x22; 20])));
        assert_eq!(info.data, vec![0xff]);
        assert_eq!(info.chain_id_offset, None);
    }

    #[test]
    fn test_decode_access_list_contract_creation() {
        // chainId, nonce, gasPrice, gas, to, value, data, accessList
        let raw = hex!("01 ca 0a 80 01 02 80 80 82beef c0");
        let info = TxInfo::decode(&raw).unwrap();
        assert_eq!(info.tx_type, TxType::AccessList);
        assert_eq!(info.chain_id, 10);
        assert_eq!(info.to, None);
        assert_eq!(info.data, hex!("beef"));
    }

    #[test]
    fn test_blob_is_recognized_but_unsupported() {
        let mut body = vec![0x01, 0x80, 0x01, 0x02, 0x03, 0x94];
        body.extend_from_slice(&[0x33; 20]);
        body.extend_from_slice(&[0x80, 0x80, 0xc0, 0x01, 0xc0]);
        let mut raw = vec![0x03, 0xc0 + body.len() as u8];
        raw.extend(body);
        let info = TxInfo::decode(&raw).unwrap();
        assert_eq!(info.tx_type, TxType::Blob);
        assert!(!info.tx_type.is_supported());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            TxInfo::decode(&[]),
            Err(EncodingError::MalformedTransaction(_))
        ));
        assert!(matches!(
            TxInfo::decode(&[0x04, 0xc0]),
            Err(EncodingError::UnsupportedTxType(0x04))
        ));
        assert!(matches!(
            TxInfo::decode(&hex!("c3 01 02 03")),
            Err(EncodingError::MalformedTransaction("too few fields"))
        ));
        assert!(TxInfo::decode(&hex!("02 c5 01 02")).is_err());
    }
}
