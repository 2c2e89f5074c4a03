use crate::constants::MAX_APDU_DATA_LENGTH;
use crate::error::EncodingError;

/// Status words the Ethereum app is known to return.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusWord {
    /// Success
    OK = 0x9000,
    /// Device is locked
    LockedDevice = 0x5515,
    /// Mode check failed
    ModeCheckFailed = 0x6001,
    /// Transaction type not supported
    TxTypeNotSupported = 0x6501,
    /// Output buffer too small
    OutputBufferTooSmall = 0x6502,
    /// Plugin error
    PluginError = 0x6503,
    /// Integer conversion error
    IntConversionError = 0x6504,
    /// App not open
    AppNotOpen = 0x6511,
    /// Incorrect length
    IncorrectLength = 0x6700,
    /// Security status not satisfied
    SecurityStatusNotSatisfied = 0x6982,
    /// Rejected by user
    Deny = 0x6985,
    /// Incorrect data
    IncorrectData = 0x6A80,
    /// Not enough memory
    NotEnoughMemory = 0x6A84,
    /// Referenced data not found
    ReferencedDataNotFound = 0x6A88,
    /// Wrong P1P2
    WrongP1P2 = 0x6B00,
    /// Ins not supported
    InsNotSupported = 0x6D00,
    /// Cla not supported
    ClaNotSupported = 0x6E00,
    /// Technical problem
    TechnicalProblem = 0x6F00,
    /// Command code not supported
    CommandCodeNotSupported = 0x911C,
}

impl TryFrom<u16> for StatusWord {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x9000 => Ok(StatusWord::OK),
            0x5515 => Ok(StatusWord::LockedDevice),
            0x6001 => Ok(StatusWord::ModeCheckFailed),
            0x6501 => Ok(StatusWord::TxTypeNotSupported),
            0x6502 => Ok(StatusWord::OutputBufferTooSmall),
            0x6503 => Ok(StatusWord::PluginError),
            0x6504 => Ok(StatusWord::IntConversionError),
            0x6511 => Ok(StatusWord::AppNotOpen),
            0x6700 => Ok(StatusWord::IncorrectLength),
            0x6982 => Ok(StatusWord::SecurityStatusNotSatisfied),
            0x6985 => Ok(StatusWord::Deny),
            0x6A80 => Ok(StatusWord::IncorrectData),
            0x6A84 => Ok(StatusWord::NotEnoughMemory),
            0x6A88 => Ok(StatusWord::ReferencedDataNotFound),
            0x6B00 => Ok(StatusWord::WrongP1P2),
            0x6D00 => Ok(StatusWord::InsNotSupported),
            0x6E00 => Ok(StatusWord::ClaNotSupported),
            0x6F00 => Ok(StatusWord::TechnicalProblem),
            0x911C => Ok(StatusWord::CommandCodeNotSupported),
            _ => Err(()),
        }
    }
}

impl StatusWord {
    pub fn description(self) -> &'static str {
        match self {
            StatusWord::OK => "success",
            StatusWord::LockedDevice => "device is locked",
            StatusWord::ModeCheckFailed => "mode check failed",
            StatusWord::TxTypeNotSupported => "transaction type not supported",
            StatusWord::OutputBufferTooSmall => "output buffer too small",
            StatusWord::PluginError => "plugin error",
            StatusWord::IntConversionError => "integer conversion error",
            StatusWord::AppNotOpen => "app not open",
            StatusWord::IncorrectLength => "incorrect length",
            StatusWord::SecurityStatusNotSatisfied => "security status not satisfied",
            StatusWord::Deny => "condition not satisfied or rejected by user",
            StatusWord::IncorrectData => "invalid data",
            StatusWord::NotEnoughMemory => "insufficient memory",
            StatusWord::ReferencedDataNotFound => "data element not found",
            StatusWord::WrongP1P2 => "incorrect parameters",
            StatusWord::InsNotSupported => "instruction not supported",
            StatusWord::ClaNotSupported => "class not supported",
            StatusWord::TechnicalProblem => "technical problem",
            StatusWord::CommandCodeNotSupported => "command code not supported",
        }
    }
}

/// Human-readable text for any status word, known or not.
pub fn status_message(code: u16) -> &'static str {
    StatusWord::try_from(code)
        .map(StatusWord::description)
        .unwrap_or("unknown status word")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct APDUCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl APDUCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        APDUCommand {
            cla,
            ins,
            p1,
            p2,
            data,
        }
    }

    /// Serializes to `cla ins p1 p2 len data`. Only short APDUs are accepted.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        if self.data.len() > MAX_APDU_DATA_LENGTH {
            return Err(EncodingError::FieldTooLong {
                field: "APDU data",
                len: self.data.len(),
                max: MAX_APDU_DATA_LENGTH,
            });
        }
        let mut vec = vec![self.cla, self.ins, self.p1, self.p2, self.data.len() as u8];
        vec.extend_from_slice(&self.data);
        Ok(vec)
    }

    /// Parses a short APDU. Used by the device side of tests and tooling.
    pub fn decode(raw: &[u8]) -> Result<Self, EncodingError> {
        if raw.len() < 5 {
            return Err(EncodingError::ResponseTooShort {
                expected: 5,
                actual: raw.len(),
            });
        }
        let len = raw[4] as usize;
        if raw.len() != 5 + len {
            return Err(EncodingError::InvalidLength {
                field: "APDU data",
                expected: len,
                actual: raw.len() - 5,
            });
        }
        Ok(APDUCommand::new(raw[0], raw[1], raw[2], raw[3], raw[5..].to_vec()))
    }
}

/// A response split into its data and trailing status word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct APDUAnswer {
    data: Vec<u8>,
    retcode: u16,
}

impl APDUAnswer {
    pub fn from_answer(mut answer: Vec<u8>) -> Result<Self, EncodingError> {
        if answer.len() < 2 {
            return Err(EncodingError::ResponseTooShort {
                expected: 2,
                actual: answer.len(),
            });
        }
        let split = answer.len() - 2;
        let retcode = u16::from_be_bytes([answer[split], answer[split + 1]]);
        answer.truncate(split);
        Ok(APDUAnswer {
            data: answer,
            retcode,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn retcode(&self) -> u16 {
        self.retcode
    }

    pub fn is_ok(&self) -> bool {
        self.retcode == StatusWord::OK as u16
    }

    /// Appends `retcode` to `data`, as the device puts it on the wire.
    pub fn encode(data: &[u8], retcode: u16) -> Vec<u8> {
        let mut vec = Vec::with_capacity(data.len() + 2);
        vec.extend_from_slice(data);
        vec.extend_from_slice(&retcode.to_be_bytes());
        vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_encode_short_apdu() {
        let cmd = APDUCommand::new(0xE0, 0x06, 0x00, 0x00, vec![]);
        assert_eq!(cmd.encode().unwrap(), hex!("e006000000"));

        let cmd = APDUCommand::new(0xE0, 0x04, 0x80, 0x00, vec![0xaa, 0xbb]);
        assert_eq!(cmd.encode().unwrap(), hex!("e004800002aabb"));
    }

    #[test]
    fn test_encode_rejects_long_data() {
        let cmd = APDUCommand::new(0xE0, 0x04, 0x00, 0x00, vec![0; 256]);
        assert!(matches!(
            cmd.encode(),
            Err(EncodingError::FieldTooLong { len: 256, .. })
        ));
        let cmd = APDUCommand::new(0xE0, 0x04, 0x00, 0x00, vec![0; 255]);
        assert_eq!(cmd.encode().unwrap().len(), 260);
    }

    #[test]
    fn test_decode_apdu() {
        let cmd = APDUCommand::decode(&hex!("e01c00ff0300017a")).unwrap();
        assert_eq!(cmd.ins, 0x1C);
        assert_eq!(cmd.p2, 0xFF);
        assert_eq!(cmd.data, hex!("00017a"));
        assert!(APDUCommand::decode(&hex!("e01c00ff0300")).is_err());
        assert!(APDUCommand::decode(&hex!("e01c")).is_err());
    }

    #[test]
    fn test_answer_splits_status_word() {
        let answer = APDUAnswer::from_answer(hex!("0f0102039000").to_vec()).unwrap();
        assert_eq!(answer.data(), &hex!("0f010203"));
        assert_eq!(answer.retcode(), 0x9000);
        assert!(answer.is_ok());

        let answer = APDUAnswer::from_answer(hex!("6985").to_vec()).unwrap();
        assert!(answer.data().is_empty());
        assert!(!answer.is_ok());

        assert!(matches!(
            APDUAnswer::from_answer(vec![0x90]),
            Err(EncodingError::ResponseTooShort { actual: 1, .. })
        ));
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(StatusWord::try_from(0x6985), Ok(StatusWord::Deny));
        assert_eq!(status_message(0x6A80), "invalid data");
        assert_eq!(status_message(0x1234), "unknown status word");
    }
}
