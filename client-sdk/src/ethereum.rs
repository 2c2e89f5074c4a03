//! Ethereum app client.
//!
//! Provides async methods for the app's instructions. Every method takes a
//! [`CallContext`] that can cancel the call or bound it with a deadline.

use common::apdu::{status_message, APDUCommand, StatusWord};
use common::chunking::{plan_chunks, Chunk};
use common::constants::*;
use common::eip712::{Action, DataComponent, TypeComponent};
use common::schema::{self, AddressInfo, AppConfiguration};
use common::signature::recover_legacy_v;
use common::{Bip32Path, EncodingError, Signature, TxInfo, TxType};
use log::debug;

use crate::context::CallContext;
use crate::error::ClientError;
use crate::transport::{self, Transport};

/// Ethereum app client.
pub struct EthereumClient<T> {
    transport: T,
}

impl<T: Transport> EthereumClient<T> {
    /// Creates a new Ethereum client with the given transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends one command and fails on any status word other than success.
    pub(crate) async fn send_checked(
        &self,
        ctx: &CallContext,
        ins: u8,
        p1: u8,
        p2: u8,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, ClientError> {
        let command = APDUCommand::new(CLA, ins, p1, p2, data);
        let (data, retcode) = transport::send(&self.transport, ctx, &command).await?;
        if retcode != StatusWord::OK as u16 {
            debug!("ins {ins:#04x} rejected with {retcode:#06x}");
            return Err(ClientError::Status {
                code: retcode,
                message: status_message(retcode),
            });
        }
        Ok(data)
    }

    /// Sends `payload` chunk by chunk and returns the last response.
    async fn send_chunked<F>(
        &self,
        ctx: &CallContext,
        ins: u8,
        p2: u8,
        payload: &[u8],
        chunks: &[Chunk],
        marker: F,
    ) -> Result<Vec<u8>, ClientError>
    where
        F: Fn(&Chunk) -> u8,
    {
        let mut response = Vec::new();
        for chunk in chunks {
            let data = payload[chunk.range.clone()].to_vec();
            response = self.send_checked(ctx, ins, marker(chunk), p2, data).await?;
        }
        Ok(response)
    }

    /// Gets the app configuration and version.
    pub async fn get_configuration(&self, ctx: &CallContext) -> Result<AppConfiguration, ClientError> {
        let data = self
            .send_checked(ctx, INS_GET_CONFIGURATION, 0x00, 0x00, Vec::new())
            .await?;
        Ok(AppConfiguration::from_response(&data)?)
    }

    /// Derives an account and returns its public key and address.
    ///
    /// # Arguments
    /// * `path` - BIP32 derivation path (e.g., "m/44'/60'/0'/0/0")
    /// * `confirm` - show the address on the device and wait for approval
    /// * `chain_code` - also return the BIP32 chain code
    /// * `chain_id` - chain to display the address for, if any
    pub async fn get_address(
        &self,
        ctx: &CallContext,
        path: &str,
        confirm: bool,
        chain_code: bool,
        chain_id: Option<u64>,
    ) -> Result<AddressInfo, ClientError> {
        let path: Bip32Path = path.parse()?;
        let data = schema::get_address_request(&path, chain_id)?;
        let p1 = if confirm { P1_WITH_CONFIRM } else { P1_WITHOUT_CONFIRM };
        let p2 = if chain_code { P2_WITH_CHAIN_CODE } else { P2_NO_CHAIN_CODE };
        let response = self.send_checked(ctx, INS_GET_PUBLIC_KEY, p1, p2, data).await?;
        Ok(AddressInfo::from_response(&response)?)
    }

    /// Signs a transaction.
    ///
    /// # Arguments
    /// * `path` - BIP32 derivation path
    /// * `raw_tx` - unsigned transaction: RLP list for legacy, type byte and RLP list otherwise
    ///
    /// For legacy transactions the returned `v` is the full EIP-155 value.
    pub async fn sign_transaction(
        &self,
        ctx: &CallContext,
        path: &str,
        raw_tx: &[u8],
    ) -> Result<Signature, ClientError> {
        let tx = TxInfo::decode(raw_tx)?;
        if !tx.tx_type.is_supported() {
            return Err(EncodingError::UnsupportedTxType(tx.tx_type as u8).into());
        }
        let path: Bip32Path = path.parse()?;
        let payload = schema::sign_transaction_request(&path, raw_tx)?;

        let boundary = tx.chain_id_offset.map(|offset| path.encoded_len() + offset);
        let chunks = plan_chunks(payload.len(), boundary);
        if chunks
            .iter()
            .any(|chunk| !chunk.is_last && chunk.range.len() < MAX_APDU_DATA_LENGTH)
        {
            debug!("shortened a chunk so no command starts at the chain id");
        }
        debug!(
            "signing {:?} transaction for chain {} in {} chunks",
            tx.tx_type,
            tx.chain_id,
            chunks.len()
        );
        let response = self
            .send_chunked(ctx, INS_SIGN_TRANSACTION, 0x00, &payload, &chunks, first_chunk_marker)
            .await?;

        let mut signature = Signature::from_response(&response)?;
        if tx.tx_type == TxType::Legacy {
            signature.v = recover_legacy_v(signature.v as u8, tx.chain_id);
        }
        Ok(signature)
    }

    /// Signs a personal message (EIP-191).
    pub async fn sign_personal_message(
        &self,
        ctx: &CallContext,
        path: &str,
        message: &[u8],
    ) -> Result<Signature, ClientError> {
        let path: Bip32Path = path.parse()?;
        let payload = schema::personal_message_request(&path, message)?;
        let chunks = plan_chunks(payload.len(), None);
        let response = self
            .send_chunked(ctx, INS_SIGN_PERSONAL_MESSAGE, 0x00, &payload, &chunks, first_chunk_marker)
            .await?;
        Ok(Signature::from_response(&response)?)
    }

    /// Signs an EIP-712 message given its domain separator and struct hash.
    pub async fn sign_eip712_hashed(
        &self,
        ctx: &CallContext,
        path: &str,
        domain_hash: &[u8],
        message_hash: &[u8],
    ) -> Result<Signature, ClientError> {
        let path: Bip32Path = path.parse()?;
        let data = schema::eip712_hashed_request(&path, domain_hash, message_hash)?;
        let response = self.send_checked(ctx, INS_SIGN_EIP712, 0x00, 0x00, data).await?;
        Ok(Signature::from_response(&response)?)
    }

    /// Sends one struct definition component.
    pub async fn eip712_send_struct_definition(
        &self,
        ctx: &CallContext,
        component: TypeComponent,
        value: &[u8],
    ) -> Result<(), ClientError> {
        debug!("eip712 struct definition {component:?}: {}", hex::encode(value));
        self.send_checked(ctx, INS_EIP712_STRUCT_DEFINITION, 0x00, component as u8, value.to_vec())
            .await?;
        Ok(())
    }

    /// Sends one struct data component, split into partial chunks when long.
    pub async fn eip712_send_struct_data(
        &self,
        ctx: &CallContext,
        component: DataComponent,
        value: &[u8],
    ) -> Result<(), ClientError> {
        debug!("eip712 struct data {component:?}: {}", hex::encode(value));
        let chunks = plan_chunks(value.len(), None);
        self.send_chunked(ctx, INS_EIP712_STRUCT_DATA, component as u8, value, &chunks, |chunk| {
            if chunk.is_last {
                P1_COMPLETE_DATA
            } else {
                P1_PARTIAL_DATA
            }
        })
        .await?;
        Ok(())
    }

    /// Sends one clear-signing command.
    pub async fn eip712_send_clear_signing(
        &self,
        ctx: &CallContext,
        action: Action,
        value: &[u8],
    ) -> Result<(), ClientError> {
        debug!("eip712 clear signing {action:?}: {}", hex::encode(value));
        self.send_checked(ctx, INS_EIP712_CLEAR_SIGNING, 0x00, action as u8, value.to_vec())
            .await?;
        Ok(())
    }

    /// Provides signed token metadata. Returns the slot the device stored it in.
    pub async fn provide_erc20_information(
        &self,
        ctx: &CallContext,
        info: &[u8],
    ) -> Result<u8, ClientError> {
        let response = self
            .send_checked(ctx, INS_PROVIDE_ERC20_INFORMATION, 0x00, 0x00, info.to_vec())
            .await?;
        response.first().copied().ok_or_else(|| {
            EncodingError::ResponseTooShort {
                expected: 1,
                actual: 0,
            }
            .into()
        })
    }

    /// Gets the BLS public key for an ETH2 validator path. The response is returned as-is.
    pub async fn eth2_get_public_key(
        &self,
        ctx: &CallContext,
        path: &str,
        confirm: bool,
    ) -> Result<Vec<u8>, ClientError> {
        let path: Bip32Path = path.parse()?;
        let p1 = if confirm { P1_WITH_CONFIRM } else { P1_WITHOUT_CONFIRM };
        self.send_checked(ctx, INS_ETH2_GET_PUBLIC_KEY, p1, 0x00, path.serialize()?)
            .await
    }

    /// Sets the index of the ETH2 withdrawal key.
    pub async fn eth2_set_withdrawal_index(
        &self,
        ctx: &CallContext,
        index: u32,
    ) -> Result<(), ClientError> {
        self.send_checked(ctx, INS_ETH2_SET_WITHDRAWAL_INDEX, 0x00, 0x00, index.to_be_bytes().to_vec())
            .await?;
        Ok(())
    }

    /// Gets the public encryption key of an account, as raw bytes.
    pub async fn get_privacy_public_key(
        &self,
        ctx: &CallContext,
        path: &str,
        confirm: bool,
    ) -> Result<Vec<u8>, ClientError> {
        let path: Bip32Path = path.parse()?;
        let p1 = if confirm { P1_WITH_CONFIRM } else { P1_WITHOUT_CONFIRM };
        self.send_checked(ctx, INS_PERFORM_PRIVACY_OPERATION, p1, P2_PRIVACY_PUBLIC_KEY, path.serialize()?)
            .await
    }

    /// Derives the shared secret between an account and a remote public key.
    pub async fn get_privacy_shared_secret(
        &self,
        ctx: &CallContext,
        path: &str,
        remote_public_key: &[u8],
        confirm: bool,
    ) -> Result<Vec<u8>, ClientError> {
        let path: Bip32Path = path.parse()?;
        let data = schema::privacy_shared_secret_request(&path, remote_public_key)?;
        let p1 = if confirm { P1_WITH_CONFIRM } else { P1_WITHOUT_CONFIRM };
        self.send_checked(ctx, INS_PERFORM_PRIVACY_OPERATION, p1, P2_PRIVACY_SHARED_SECRET, data)
            .await
    }
}

fn first_chunk_marker(chunk: &Chunk) -> u8 {
    if chunk.is_first {
        P1_FIRST_CHUNK
    } else {
        P1_MORE_CHUNK
    }
}

