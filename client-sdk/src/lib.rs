//! Host-side client for the Ledger Ethereum app.
//!
//! [`transport::FrameTransport`] frames APDUs over any [`channel::ByteChannel`]
//! (USB HID with the `hid` feature), and [`EthereumClient`] sequences the
//! app's instructions on top of it, including chunked transaction signing
//! and field-by-field EIP-712 signing.
//!
//! ```no_run
//! # #[cfg(feature = "hid")]
//! # async fn example() -> Result<(), ledger_eth_client_sdk::ClientError> {
//! use ledger_eth_client_sdk::channel::HidChannel;
//! use ledger_eth_client_sdk::transport::FrameTransport;
//! use ledger_eth_client_sdk::{CallContext, EthereumClient};
//!
//! let transport = FrameTransport::new(HidChannel::open_first()?);
//! let client = EthereumClient::new(transport);
//! let config = client.get_configuration(&CallContext::background()).await?;
//! println!("app version {}", config.version);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod context;
mod eip712;
pub mod error;
pub mod ethereum;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod transport;

pub use common;
pub use context::{CallContext, CancelHandle};
pub use error::{ClientError, FramingError};
pub use ethereum::EthereumClient;
