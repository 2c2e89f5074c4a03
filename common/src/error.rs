//! Error types shared by every codec in this crate.

use core::fmt;

use thiserror::Error;

/// Failures while building or parsing wire data. None of these involve I/O.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum EncodingError {
    #[error("empty RLP input at offset {offset}")]
    RlpEmpty { offset: usize },
    #[error("truncated RLP item at offset {offset}: needs {needed} bytes, {available} available")]
    RlpTruncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("RLP length does not fit in memory at offset {offset}")]
    RlpLengthOverflow { offset: usize },
    #[error("RLP nesting deeper than {max} levels at offset {offset}")]
    RlpTooDeep { offset: usize, max: usize },
    #[error("RLP input has trailing data: decoded {consumed} of {total} bytes")]
    RlpTrailingData { consumed: usize, total: usize },

    #[error("unsupported transaction type {0:#04x}")]
    UnsupportedTxType(u8),
    #[error("malformed transaction: {0}")]
    MalformedTransaction(&'static str),

    #[error("invalid BIP-32 path {path:?}: bad component {component:?}")]
    InvalidBip32Path { path: String, component: String },

    #[error("{field} is {len} bytes long, at most {max} allowed")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} must be {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("response too short: expected at least {expected} bytes, got {actual}")]
    ResponseTooShort { expected: usize, actual: usize },
    #[error("truncated ERC-20 signature record at offset {offset}")]
    TruncatedTokenRecord { offset: usize },
    #[error("unsupported typed-data type {0:?}")]
    UnsupportedType(String),
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failures specific to the EIP-712 clear-signing extension.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ClearSigningError {
    #[error("coin reference {coin_ref} has not been registered with the device")]
    UnregisteredCoinRef { coin_ref: u8 },
    #[error("unknown clear-signing field format {0:?}")]
    UnknownFieldFormat(String),
    #[error("token field at {path:?} is not an address")]
    NotAnAddress { path: String },
    #[error("clear-signing field at {path:?} is not an atomic value")]
    NotAtomic { path: String },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Walk failure, carrying the path of the node whose visitor failed.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkError<E> {
    pub path: String,
    pub source: E,
}

impl<E> fmt::Display for WalkError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "typed-data walk failed at {:?}", self.path)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for WalkError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub type Result<T, E = EncodingError> = core::result::Result<T, E>;
