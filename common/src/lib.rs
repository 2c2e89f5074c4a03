//! Wire types and codecs for the Ledger Ethereum app.
//!
//! Everything here is pure data transformation; the async transport and
//! the command sequencing live in the client SDK.

pub mod address;
pub mod apdu;
pub mod bip32;
pub mod chunking;
pub mod constants;
pub mod eip712;
pub mod error;
pub mod rlp;
pub mod schema;
pub mod signature;
pub mod transaction;

pub use address::Address;
pub use bip32::Bip32Path;
pub use error::{ClearSigningError, EncodingError, WalkError};
pub use signature::Signature;
pub use transaction::{TxInfo, TxType};
