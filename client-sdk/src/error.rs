use std::io;

use common::{ClearSigningError, EncodingError};
use thiserror::Error;

/// Violations of the HID framing protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FramingError {
    #[error("packet {sequence}: channel {actual:#06x}, expected {expected:#06x}")]
    ChannelMismatch {
        sequence: u16,
        expected: u16,
        actual: u16,
    },
    #[error("packet {sequence}: tag {actual:#04x}, expected {expected:#04x}")]
    TagMismatch { sequence: u16, expected: u8, actual: u8 },
    #[error("packet sequence {actual}, expected {expected}")]
    SequenceMismatch { expected: u16, actual: u16 },
    #[error("packet {sequence}: read {actual} bytes, expected {expected}")]
    ShortRead {
        sequence: u16,
        expected: usize,
        actual: usize,
    },
    #[error("packet {sequence}: wrote {actual} bytes, expected {expected}")]
    ShortWrite {
        sequence: u16,
        expected: usize,
        actual: usize,
    },
    #[error("packet size {0} cannot hold the frame header and length prefix")]
    InvalidPacketSize(usize),
    #[error("command of {0} bytes does not fit a 16-bit frame length")]
    CommandTooLong(usize),
    #[error("response of {0} bytes has no status word")]
    ResponseTooShort(usize),
    #[error("session was interrupted mid-exchange; reset the transport before reuse")]
    SessionPoisoned,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("transport I/O failed: {0}")]
    Transport(#[from] io::Error),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("device returned {code:#06x}: {message}")]
    Status { code: u16, message: &'static str },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    ClearSigning(#[from] ClearSigningError),
    #[error("typed-data walk failed at {path:?}: {source}")]
    Walk {
        path: String,
        #[source]
        source: Box<ClientError>,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out")]
    TimedOut,
}

impl ClientError {
    /// True for caller-initiated cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        match self {
            ClientError::Cancelled | ClientError::TimedOut => true,
            ClientError::Walk { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// The device status word, if the device rejected a command.
    pub fn status_word(&self) -> Option<u16> {
        match self {
            ClientError::Status { code, .. } => Some(*code),
            ClientError::Walk { source, .. } => source.status_word(),
            _ => None,
        }
    }
}

impl<E: Into<ClientError>> From<common::WalkError<E>> for ClientError {
    fn from(err: common::WalkError<E>) -> Self {
        ClientError::Walk {
            path: err.path,
            source: Box::new(err.source.into()),
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
