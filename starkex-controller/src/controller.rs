//! The controller: typed operation handlers and the request dispatcher.
//!
//! Every operation follows the same shape: assert the claimed identity when
//! the operation moves funds or mutates protocol state, resolve the key
//! pair it needs, then either sign a canonical message or assemble an
//! unsigned exchange transaction. [`StarkController::resolve`] is the sole
//! boundary where failures become `{id, error}` envelopes; nothing below it
//! catches errors.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use starkex_crypto::{
    account_path, felt_to_hex, hash_token_id, limit_order_message_hash, parse_felt,
    serialize_signature, sign_message, transfer_message_hash,
};

use crate::accounts::{AccountKeyStore, DEFAULT_ACCOUNT_MAPPING_KEY};
use crate::error::ControllerError;
use crate::exchange::{build_transaction, encode_felt_arg};
use crate::methods::{
    AccountParams, AccountResult, CreateOrderParams, DepositCancelParams, DepositParams,
    EscapeParams, FreezeParams, FullWithdrawalParams, RegisterParams, RequestEnvelope,
    ResponseEnvelope, SignatureResult, StarkMethod, TransactionResult, TransferParams,
    VerifyEscapeParams, WithdrawalParams,
};
use crate::store::Store;

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Persistence key under which the account mapping is stored.
    pub account_mapping_key: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            account_mapping_key: DEFAULT_ACCOUNT_MAPPING_KEY.to_string(),
        }
    }
}

/// The StarkEx key controller.
///
/// Owns the account key store and serves the fixed RPC operation set. One
/// instance per (master secret, owner address, store); concurrent requests
/// against the same instance are safe.
pub struct StarkController {
    owner_address: String,
    accounts: AccountKeyStore,
}

impl StarkController {
    /// Create a controller with the default configuration.
    pub fn new(
        master_secret: impl Into<Vec<u8>>,
        owner_address: impl Into<String>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self::with_config(master_secret, owner_address, store, ControllerConfig::default())
    }

    /// Create a controller with an explicit configuration.
    pub fn with_config(
        master_secret: impl Into<Vec<u8>>,
        owner_address: impl Into<String>,
        store: Arc<dyn Store>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            owner_address: owner_address.into(),
            accounts: AccountKeyStore::new(
                master_secret,
                config.account_mapping_key,
                store,
            ),
        }
    }

    /// The underlying key store, for embedders and tests that need direct
    /// access to the mapping or the active path.
    pub fn accounts(&self) -> &AccountKeyStore {
        &self.accounts
    }

    /// Resolve a request envelope into a response envelope. Never fails:
    /// every error is flattened into `{id, error}` here.
    pub async fn resolve(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let RequestEnvelope { id, method, params } = request;
        debug!(id, %method, "dispatching stark rpc request");
        match self.dispatch(&method, params).await {
            Ok(result) => ResponseEnvelope::success(id, result),
            Err(error) => {
                warn!(id, %method, %error, "stark rpc request failed");
                ResponseEnvelope::failure(id, &error)
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ControllerError> {
        let call = StarkMethod::parse(method, params)?;
        match call {
            StarkMethod::Account(p) => to_value(self.account(p).await?),
            StarkMethod::Register(p) => to_value(self.register(p).await?),
            StarkMethod::Deposit(p) => to_value(self.deposit(p).await?),
            StarkMethod::DepositCancel(p) => to_value(self.deposit_cancel(p).await?),
            StarkMethod::DepositReclaim(p) => to_value(self.deposit_reclaim(p).await?),
            StarkMethod::Transfer(p) => to_value(self.transfer(p).await?),
            StarkMethod::CreateOrder(p) => to_value(self.create_order(p).await?),
            StarkMethod::Withdrawal(p) => to_value(self.withdrawal(p).await?),
            StarkMethod::FullWithdrawal(p) => to_value(self.full_withdrawal(p).await?),
            StarkMethod::Freeze(p) => to_value(self.freeze(p).await?),
            StarkMethod::VerifyEscape(p) => to_value(self.verify_escape(p).await?),
            StarkMethod::Escape(p) => to_value(self.escape(p).await?),
        }
    }

    /// `stark_account`: public identity for a derived path. The only
    /// operation allowed to derive a new key pair for an arbitrary path,
    /// because it is how a caller establishes which identity is available.
    pub async fn account(
        &self,
        params: AccountParams,
    ) -> Result<AccountResult, ControllerError> {
        let index = parse_u32("index", &params.index)?;
        let path = account_path(
            &params.layer,
            &params.application,
            &self.owner_address,
            index,
        )?;
        let public_key = self.accounts.stark_public_key(Some(&path)).await?;
        Ok(AccountResult {
            stark_public_key: felt_to_hex(&public_key),
        })
    }

    /// `stark_register`: unsigned registration transaction. No identity
    /// check; registration is what binds an identity in the first place.
    pub async fn register(
        &self,
        params: RegisterParams,
    ) -> Result<TransactionResult, ControllerError> {
        let stark_key = encode_felt_arg("starkPublicKey", &params.stark_public_key)?;
        let tx = build_transaction(
            &params.contract_address,
            "register",
            vec![stark_key, params.operator_signature],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_deposit`: unsigned deposit transaction.
    pub async fn deposit(
        &self,
        params: DepositParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let token_id = hash_token_id(&params.token)?;
        let tx = build_transaction(
            &params.contract_address,
            "deposit",
            vec![
                felt_to_hex(&token_id),
                encode_felt_arg("vaultId", &params.vault_id)?,
                encode_felt_arg("quantizedAmount", &params.quantized_amount)?,
            ],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_depositCancel`: unsigned deposit-cancellation transaction.
    pub async fn deposit_cancel(
        &self,
        params: DepositCancelParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let token_id = hash_token_id(&params.token)?;
        let tx = build_transaction(
            &params.contract_address,
            "depositCancel",
            vec![
                felt_to_hex(&token_id),
                encode_felt_arg("vaultId", &params.vault_id)?,
            ],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_depositReclaim`: unsigned deposit-reclaim transaction.
    pub async fn deposit_reclaim(
        &self,
        params: DepositCancelParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let token_id = hash_token_id(&params.token)?;
        let tx = build_transaction(
            &params.contract_address,
            "depositReclaim",
            vec![
                felt_to_hex(&token_id),
                encode_felt_arg("vaultId", &params.vault_id)?,
            ],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_transfer`: sign the canonical transfer message with the active
    /// key pair.
    pub async fn transfer(
        &self,
        params: TransferParams,
    ) -> Result<SignatureResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.from.stark_public_key)
            .await?;
        let token_id = hash_token_id(&params.token)?;
        let receiver = parse_felt(&params.to.stark_public_key)?;
        let message = transfer_message_hash(
            token_id,
            receiver,
            parse_u64("from.vaultId", &params.from.vault_id)?,
            parse_u64("to.vaultId", &params.to.vault_id)?,
            parse_u64("quantizedAmount", &params.quantized_amount)?,
            parse_u64("nonce", &params.nonce)?,
            parse_u64("expirationTimestamp", &params.expiration_timestamp)?,
        )?;
        let key_pair = self.accounts.key_pair(None).await?;
        let signature = sign_message(&key_pair, &message)?;
        Ok(SignatureResult {
            stark_signature: serialize_signature(&signature),
        })
    }

    /// `stark_createOrder`: sign the canonical limit-order message with the
    /// active key pair.
    pub async fn create_order(
        &self,
        params: CreateOrderParams,
    ) -> Result<SignatureResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let token_sell = hash_token_id(&params.sell.token)?;
        let token_buy = hash_token_id(&params.buy.token)?;
        let message = limit_order_message_hash(
            token_sell,
            token_buy,
            parse_u64("sell.vaultId", &params.sell.vault_id)?,
            parse_u64("buy.vaultId", &params.buy.vault_id)?,
            parse_u64("sell.quantizedAmount", &params.sell.quantized_amount)?,
            parse_u64("buy.quantizedAmount", &params.buy.quantized_amount)?,
            parse_u64("nonce", &params.nonce)?,
            parse_u64("expirationTimestamp", &params.expiration_timestamp)?,
        )?;
        let key_pair = self.accounts.key_pair(None).await?;
        let signature = sign_message(&key_pair, &message)?;
        Ok(SignatureResult {
            stark_signature: serialize_signature(&signature),
        })
    }

    /// `stark_withdrawal`: unsigned withdrawal transaction.
    pub async fn withdrawal(
        &self,
        params: WithdrawalParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let token_id = hash_token_id(&params.token)?;
        let tx = build_transaction(
            &params.contract_address,
            "withdraw",
            vec![felt_to_hex(&token_id)],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_fullWithdrawal`: unsigned full-withdrawal request.
    pub async fn full_withdrawal(
        &self,
        params: FullWithdrawalParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let tx = build_transaction(
            &params.contract_address,
            "fullWithdrawalRequest",
            vec![encode_felt_arg("vaultId", &params.vault_id)?],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_freeze`: unsigned freeze request.
    pub async fn freeze(
        &self,
        params: FreezeParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let tx = build_transaction(
            &params.contract_address,
            "freezeRequest",
            vec![encode_felt_arg("vaultId", &params.vault_id)?],
        )?;
        Ok(TransactionResult { tx })
    }

    /// `stark_verifyEscape`: unsigned escape-verification transaction.
    pub async fn verify_escape(
        &self,
        params: VerifyEscapeParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let calldata = params
            .proof
            .iter()
            .map(|entry| encode_felt_arg("proof", entry))
            .collect::<Result<Vec<_>, _>>()?;
        let tx = build_transaction(&params.contract_address, "verifyEscape", calldata)?;
        Ok(TransactionResult { tx })
    }

    /// `stark_escape`: unsigned escape transaction.
    pub async fn escape(
        &self,
        params: EscapeParams,
    ) -> Result<TransactionResult, ControllerError> {
        self.accounts
            .assert_active_identity(&params.stark_public_key)
            .await?;
        let token_id = hash_token_id(&params.token)?;
        let tx = build_transaction(
            &params.contract_address,
            "escape",
            vec![
                encode_felt_arg("starkPublicKey", &params.stark_public_key)?,
                encode_felt_arg("vaultId", &params.vault_id)?,
                felt_to_hex(&token_id),
                encode_felt_arg("quantizedAmount", &params.quantized_amount)?,
            ],
        )?;
        Ok(TransactionResult { tx })
    }
}

fn to_value<T: serde::Serialize>(result: T) -> Result<Value, ControllerError> {
    Ok(serde_json::to_value(result)?)
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ControllerError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ControllerError::InvalidArgument {
            field,
            reason: e.to_string(),
        })
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, ControllerError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| ControllerError::InvalidArgument {
            field,
            reason: e.to_string(),
        })
}
