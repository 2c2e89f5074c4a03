//! Field-by-field EIP-712 signing, with optional clear signing.

use std::collections::HashMap;

use common::constants::{INS_SIGN_EIP712, P2_EIP712_FULL, VERIFYING_CONTRACT_COIN_REF};
use common::eip712::{
    Action, ClearSigning, CoinRefMap, FieldFormat, Message, TypedItem,
};
use common::{Bip32Path, ClearSigningError, Signature};
use log::debug;

use crate::context::CallContext;
use crate::error::ClientError;
use crate::ethereum::EthereumClient;
use crate::transport::Transport;

/// Per-call clear-signing state.
struct ClearSigningSession<'a> {
    clear_signing: &'a ClearSigning,
    coin_refs: CoinRefMap,
    chain_id: u64,
    /// Coin reference to the token slot the device assigned.
    registered: HashMap<u8, u8>,
}

impl<T: Transport> EthereumClient<T> {
    /// Streams a typed-data message to the device and returns its signature.
    ///
    /// Commands go out in this order: type definitions, clear-signing
    /// activation, the domain tree, contract info, the primary tree and
    /// finally the signing request. The first failing command aborts the call.
    pub async fn sign_eip712_message(
        &self,
        ctx: &CallContext,
        path: &str,
        message: &Message,
    ) -> Result<Signature, ClientError> {
        let path: Bip32Path = path.parse()?;

        self.eip712_send_types(ctx, message).await?;

        if message.clear_signing.is_some() {
            debug!("activating clear signing");
            self.eip712_send_clear_signing(ctx, Action::Activate, &[])
                .await?;
        }

        let domain = message.domain.struct_item();
        self.send_tree(ctx, &domain, None).await?;

        let mut session = match &message.clear_signing {
            Some(clear_signing) => {
                let coin_refs = message.coin_ref_map()?;
                self.eip712_send_clear_signing(
                    ctx,
                    Action::MessageInfo,
                    &clear_signing.contract_payload()?,
                )
                .await?;
                Some(ClearSigningSession {
                    clear_signing,
                    coin_refs,
                    chain_id: message.domain.chain_id,
                    registered: HashMap::new(),
                })
            }
            None => None,
        };

        self.send_tree(ctx, &message.primary, session.as_mut())
            .await?;

        let response = self
            .send_checked(ctx, INS_SIGN_EIP712, 0x00, P2_EIP712_FULL, path.serialize()?)
            .await?;
        Ok(Signature::from_response(&response)?)
    }

    /// Sends the root command of `root`, then every array and atomic node
    /// beneath it in walk order.
    async fn send_tree(
        &self,
        ctx: &CallContext,
        root: &TypedItem,
        mut session: Option<&mut ClearSigningSession<'_>>,
    ) -> Result<(), ClientError> {
        let command = root.data_command()?;
        self.eip712_send_struct_data(ctx, command.component, &command.value)
            .await?;

        for (path, item) in root.nodes("") {
            self.send_node(ctx, &path, item, session.as_deref_mut())
                .await
                .map_err(|err| ClientError::Walk {
                    path: path.clone(),
                    source: Box::new(err),
                })?;
        }
        Ok(())
    }

    async fn send_node(
        &self,
        ctx: &CallContext,
        path: &str,
        item: &TypedItem,
        session: Option<&mut ClearSigningSession<'_>>,
    ) -> Result<(), ClientError> {
        if let (Some(session), TypedItem::Atomic(_)) = (session, item) {
            if let Some(field) = session.clear_signing.fields.get(path) {
                if field.format == FieldFormat::Token
                    && !session.registered.contains_key(&field.coin_ref)
                {
                    let address = session.coin_refs.get(&field.coin_ref).ok_or(
                        ClearSigningError::UnregisteredCoinRef {
                            coin_ref: field.coin_ref,
                        },
                    )?;
                    if let Some(token) = session
                        .clear_signing
                        .erc20_signatures
                        .find(session.chain_id, address)
                    {
                        debug!("providing {} for coin ref {}", token.ticker, field.coin_ref);
                        let index = self.provide_erc20_information(ctx, &token.raw).await?;
                        session.registered.insert(field.coin_ref, index);
                    }
                }

                if field.format == FieldFormat::Amount
                    && field.coin_ref == VERIFYING_CONTRACT_COIN_REF
                    && !session.registered.contains_key(&field.coin_ref)
                {
                    let address = session
                        .coin_refs
                        .get(&VERIFYING_CONTRACT_COIN_REF)
                        .copied()
                        .unwrap_or_default();
                    if let Some(token) = session
                        .clear_signing
                        .erc20_signatures
                        .find(session.chain_id, &address)
                    {
                        debug!("providing {} for the verifying contract", token.ticker);
                        self.provide_erc20_information(ctx, &token.raw).await?;
                        session
                            .registered
                            .insert(VERIFYING_CONTRACT_COIN_REF, VERIFYING_CONTRACT_COIN_REF);
                    }
                }

                let payload = field.payload(&session.registered)?;
                self.eip712_send_clear_signing(ctx, field.action(), &payload)
                    .await?;
            }
        }

        // struct nodes are implied by the type definitions
        if matches!(item, TypedItem::Struct(_)) {
            return Ok(());
        }
        let command = item.data_command()?;
        self.eip712_send_struct_data(ctx, command.component, &command.value)
            .await
    }

    /// Sends every struct definition command for the message's types.
    pub async fn eip712_send_types(
        &self,
        ctx: &CallContext,
        message: &Message,
    ) -> Result<(), ClientError> {
        for ty in &message.types {
            for (component, value) in ty.definition_commands()? {
                self.eip712_send_struct_definition(ctx, component, &value)
                    .await?;
            }
        }
        Ok(())
    }
}
