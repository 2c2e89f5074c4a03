use std::collections::HashMap;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::address::Address;
use crate::error::{ClearSigningError, EncodingError};
use crate::schema::Reader;

use super::{length_prefixed, Action};

/// How the device should render a clear-signed field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldFormat {
    Raw,
    Token,
    Amount,
    Datetime,
}

impl FromStr for FieldFormat {
    type Err = ClearSigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(FieldFormat::Raw),
            "token" => Ok(FieldFormat::Token),
            "amount" => Ok(FieldFormat::Amount),
            "datetime" => Ok(FieldFormat::Datetime),
            other => Err(ClearSigningError::UnknownFieldFormat(other.to_string())),
        }
    }
}

impl FieldFormat {
    pub fn action(self) -> Action {
        match self {
            FieldFormat::Raw => Action::Raw,
            FieldFormat::Datetime => Action::Datetime,
            FieldFormat::Token => Action::AmountTokenJoin,
            FieldFormat::Amount => Action::AmountValueJoin,
        }
    }
}

/// Display metadata for one field of the primary tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearSigningField {
    pub format: FieldFormat,
    pub label: String,
    /// Signature over the field descriptor, as issued by the metadata service.
    pub signature: Vec<u8>,
    /// Token slot linking an amount to its token. 255 is the verifying contract.
    pub coin_ref: u8,
}

impl ClearSigningField {
    pub fn action(&self) -> Action {
        self.format.action()
    }

    /// Builds the clear-signing payload. `registered` maps coin references
    /// to the index the device assigned when the token was provided.
    pub fn payload(&self, registered: &HashMap<u8, u8>) -> Result<Vec<u8>, ClearSigningError> {
        let display = length_prefixed("field label", self.label.as_bytes())?;
        let signature = length_prefixed("field signature", &self.signature)?;
        let token_index = || {
            registered
                .get(&self.coin_ref)
                .copied()
                .ok_or(ClearSigningError::UnregisteredCoinRef {
                    coin_ref: self.coin_ref,
                })
        };

        let mut out = Vec::new();
        match self.format {
            FieldFormat::Raw | FieldFormat::Datetime => {
                out.extend(display);
            }
            FieldFormat::Token => {
                out.push(token_index()?);
            }
            FieldFormat::Amount => {
                let index = token_index()?;
                out.extend(display);
                out.push(index);
            }
        }
        out.extend(signature);
        Ok(out)
    }
}

/// Label and signature describing the contract being interacted with.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ContractInfo {
    pub label: String,
    pub signature: Vec<u8>,
}

/// Token metadata signed by the device vendor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub contract_address: Address,
    pub ticker: String,
    pub decimals: u32,
    pub chain_id: u32,
    pub signature: Vec<u8>,
    /// The full record, as forwarded to `PROVIDE_ERC20_INFORMATION`.
    pub raw: Vec<u8>,
}

impl TokenInfo {
    /// Parses `tickerLen || ticker || address (20) || decimals (4) || chainId (4) || signature`.
    pub fn from_record(record: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = Reader::new(record);
        let ticker_len = reader.u8()? as usize;
        let ticker = core::str::from_utf8(reader.take(ticker_len)?)
            .map_err(|_| EncodingError::InvalidUtf8("token ticker"))?
            .to_string();
        let contract_address = Address::try_from(reader.take(20)?)?;
        let decimals = reader.u32_be()?;
        let chain_id = reader.u32_be()?;
        let signature = reader.take(reader.remaining())?.to_vec();
        Ok(TokenInfo {
            contract_address,
            ticker,
            decimals,
            chain_id,
            signature,
            raw: record.to_vec(),
        })
    }
}

/// Token metadata keyed by the low 32 bits of the chain id and the contract address.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Erc20Signatures {
    tokens: HashMap<(u32, Address), TokenInfo>,
}

impl Erc20Signatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: TokenInfo) {
        self.tokens
            .insert((token.chain_id, token.contract_address), token);
    }

    pub fn find(&self, chain_id: u64, address: &Address) -> Option<&TokenInfo> {
        self.tokens.get(&(chain_id as u32, *address))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Parses a base64 blob of `recordLen (4) || record` entries.
    pub fn from_base64(blob: &str) -> Result<Self, EncodingError> {
        let bytes = STANDARD.decode(blob)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let mut signatures = Self::new();
        let mut reader = Reader::new(bytes);
        while reader.remaining() > 0 {
            let offset = reader.position();
            let truncated = |_: EncodingError| EncodingError::TruncatedTokenRecord { offset };
            let len = reader.u32_be().map_err(truncated)? as usize;
            let record = reader.take(len).map_err(truncated)?;
            signatures.insert(TokenInfo::from_record(record).map_err(|err| match err {
                EncodingError::ResponseTooShort { .. } => {
                    EncodingError::TruncatedTokenRecord { offset }
                }
                other => other,
            })?);
        }
        Ok(signatures)
    }
}

/// Coin reference to token contract, built from the primary tree per call.
pub type CoinRefMap = HashMap<u8, Address>;

/// Clear-signing metadata attached to a typed-data message.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ClearSigning {
    pub contract: ContractInfo,
    /// Keyed by walk path, e.g. `details.token`.
    pub fields: HashMap<String, ClearSigningField>,
    pub erc20_signatures: Erc20Signatures,
}

impl ClearSigning {
    /// `labelLen || label || fieldCount || sigLen || signature`.
    pub fn contract_payload(&self) -> Result<Vec<u8>, EncodingError> {
        let count = u8::try_from(self.fields.len()).map_err(|_| EncodingError::FieldTooLong {
            field: "clear-signing fields",
            len: self.fields.len(),
            max: u8::MAX as usize,
        })?;
        let mut out = length_prefixed("contract label", self.contract.label.as_bytes())?;
        out.push(count);
        out.extend(length_prefixed(
            "contract signature",
            &self.contract.signature,
        )?);
        Ok(out)
    }
}
