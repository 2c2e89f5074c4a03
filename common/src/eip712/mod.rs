//! EIP-712 typed-data encoding for the device's field-by-field signing mode.
//!
//! A message is sent in three passes: type definitions, the domain tree and
//! the primary tree. With clear signing enabled, display metadata for
//! selected fields is interleaved with the primary tree.

mod clear_sign;
mod item;
mod message;
mod types;

pub use clear_sign::{
    ClearSigning, ClearSigningField, CoinRefMap, ContractInfo, Erc20Signatures, FieldFormat,
    TokenInfo,
};
pub use item::{AtomicValue, DataCommand, Number, StructItem, TypedItem};
pub use message::{Domain, Message};
pub use types::{ArrayLevel, FieldDefinition, FieldType, TypeStruct};

use crate::error::EncodingError;

/// Second parameter of a struct definition command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeComponent {
    Name = 0x00,
    Field = 0xFF,
}

/// Second parameter of a struct data command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DataComponent {
    Root = 0x00,
    Array = 0x0F,
    Atomic = 0xFF,
}

/// Second parameter of a clear-signing command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    Activate = 0x00,
    MessageInfo = 0x0F,
    Datetime = 0xFC,
    AmountTokenJoin = 0xFD,
    AmountValueJoin = 0xFE,
    Raw = 0xFF,
}

/// `len (1) || bytes`, failing when `bytes` does not fit a one-byte length.
pub(crate) fn length_prefixed(field: &'static str, bytes: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let len = u8::try_from(bytes.len()).map_err(|_| EncodingError::FieldTooLong {
        field,
        len: bytes.len(),
        max: u8::MAX as usize,
    })?;
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(out)
}
