//! The RPC wire contract: request/response envelopes and typed operation
//! parameters.
//!
//! Method names and parameter field names are stable external identifiers;
//! renaming any of them is a protocol version bump. Parameters arrive as an
//! untyped JSON bag and are decoded exactly once, at this boundary, into the
//! [`StarkMethod`] sum type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use starkex_crypto::TokenDescriptor;

use crate::error::ControllerError;
use crate::exchange::UnsignedTransaction;

/// An inbound RPC request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Caller-chosen request id, echoed in the response.
    pub id: u64,
    /// Operation name, e.g. `stark_transfer`.
    pub method: String,
    /// Method-specific parameter record.
    #[serde(default)]
    pub params: Value,
}

/// The uniform response envelope: the request id plus exactly one of
/// `result` or `error`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Echo of the request id.
    pub id: u64,
    /// Operation result, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description, present on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Wire form of a failure: a human-readable message. The structured
/// [`ControllerError`] kind is flattened here and only here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
    /// Human-readable failure description.
    pub message: String,
}

impl ResponseEnvelope {
    /// A successful response carrying `result`.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed response carrying the flattened error message.
    pub fn failure(id: u64, error: &ControllerError) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                message: error.to_string(),
            }),
        }
    }
}

/// Parameters for `stark_account`: selects a derivation path relative to the
/// controller's owner address.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountParams {
    /// Layer name, e.g. `starkex`.
    pub layer: String,
    /// Application name, e.g. `starkexdvf`.
    pub application: String,
    /// Account index within the hierarchy, as a decimal string.
    pub index: String,
}

/// Parameters for `stark_register`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Stark public key being registered.
    pub stark_public_key: String,
    /// Operator countersignature over the registration.
    pub operator_signature: String,
}

/// Parameters for `stark_deposit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Amount in the token's quantized unit, as a decimal string.
    pub quantized_amount: String,
    /// Token being deposited.
    pub token: TokenDescriptor,
    /// Target vault id, as a decimal string.
    pub vault_id: String,
}

/// Parameters for `stark_depositCancel` and `stark_depositReclaim`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCancelParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Token of the pending deposit.
    pub token: TokenDescriptor,
    /// Vault id of the pending deposit, as a decimal string.
    pub vault_id: String,
}

/// One side of a transfer: a public identity and its vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLeg {
    /// Stark public key of this side.
    pub stark_public_key: String,
    /// Vault id of this side, as a decimal string.
    pub vault_id: String,
}

/// Parameters for `stark_transfer`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    /// Sender leg; its key must match the active key pair.
    pub from: TransferLeg,
    /// Receiver leg.
    pub to: TransferLeg,
    /// Token being transferred.
    pub token: TokenDescriptor,
    /// Amount in the token's quantized unit, as a decimal string.
    pub quantized_amount: String,
    /// Transfer nonce, as a decimal string.
    pub nonce: String,
    /// Expiration timestamp (hours since epoch), as a decimal string.
    pub expiration_timestamp: String,
}

/// One side of a limit order: a vault, a token and an amount.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLeg {
    /// Vault id for this side, as a decimal string.
    pub vault_id: String,
    /// Token on this side of the order.
    pub token: TokenDescriptor,
    /// Amount in the token's quantized unit, as a decimal string.
    pub quantized_amount: String,
}

/// Parameters for `stark_createOrder`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderParams {
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Side being sold.
    pub sell: OrderLeg,
    /// Side being bought.
    pub buy: OrderLeg,
    /// Order nonce, as a decimal string.
    pub nonce: String,
    /// Expiration timestamp (hours since epoch), as a decimal string.
    pub expiration_timestamp: String,
}

/// Parameters for `stark_withdrawal`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Token being withdrawn.
    pub token: TokenDescriptor,
}

/// Parameters for `stark_fullWithdrawal`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullWithdrawalParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Vault id to fully withdraw, as a decimal string.
    pub vault_id: String,
}

/// Parameters for `stark_freeze`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezeParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Vault id to freeze, as a decimal string.
    pub vault_id: String,
}

/// Parameters for `stark_verifyEscape`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEscapeParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Merkle escape proof, one field element per entry.
    pub proof: Vec<String>,
}

/// Parameters for `stark_escape`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscapeParams {
    /// Exchange contract address.
    pub contract_address: String,
    /// Claimed identity; must match the active key pair.
    pub stark_public_key: String,
    /// Vault id being escaped, as a decimal string.
    pub vault_id: String,
    /// Token held in the vault.
    pub token: TokenDescriptor,
    /// Amount in the token's quantized unit, as a decimal string.
    pub quantized_amount: String,
}

/// Result of `stark_account`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResult {
    /// Public identity for the derived path.
    pub stark_public_key: String,
}

/// Result of `stark_transfer` and `stark_createOrder`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    /// Serialized signature: `0x` + r + s, fixed width.
    pub stark_signature: String,
}

/// Result of every transaction-building operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    /// The assembled unsigned transaction.
    pub tx: UnsignedTransaction,
}

/// A fully typed RPC call: one variant per operation, decoded once at the
/// dispatch boundary.
#[derive(Clone, Debug)]
pub enum StarkMethod {
    /// `stark_account`
    Account(AccountParams),
    /// `stark_register`
    Register(RegisterParams),
    /// `stark_deposit`
    Deposit(DepositParams),
    /// `stark_depositCancel`
    DepositCancel(DepositCancelParams),
    /// `stark_depositReclaim`
    DepositReclaim(DepositCancelParams),
    /// `stark_transfer`
    Transfer(TransferParams),
    /// `stark_createOrder`
    CreateOrder(CreateOrderParams),
    /// `stark_withdrawal`
    Withdrawal(WithdrawalParams),
    /// `stark_fullWithdrawal`
    FullWithdrawal(FullWithdrawalParams),
    /// `stark_freeze`
    Freeze(FreezeParams),
    /// `stark_verifyEscape`
    VerifyEscape(VerifyEscapeParams),
    /// `stark_escape`
    Escape(EscapeParams),
}

impl StarkMethod {
    /// The fixed set of operation names this controller dispatches.
    pub const METHOD_NAMES: &'static [&'static str] = &[
        "stark_account",
        "stark_register",
        "stark_deposit",
        "stark_depositCancel",
        "stark_depositReclaim",
        "stark_transfer",
        "stark_createOrder",
        "stark_withdrawal",
        "stark_fullWithdrawal",
        "stark_freeze",
        "stark_verifyEscape",
        "stark_escape",
    ];

    /// Decode a method name and parameter bag into a typed call.
    ///
    /// # Errors
    /// `UnknownMethod` for unrecognized names, `InvalidParams` when the bag
    /// does not match the operation's parameter shape.
    pub fn parse(method: &str, params: Value) -> Result<Self, ControllerError> {
        match method {
            "stark_account" => Ok(Self::Account(decode(method, params)?)),
            "stark_register" => Ok(Self::Register(decode(method, params)?)),
            "stark_deposit" => Ok(Self::Deposit(decode(method, params)?)),
            "stark_depositCancel" => Ok(Self::DepositCancel(decode(method, params)?)),
            "stark_depositReclaim" => Ok(Self::DepositReclaim(decode(method, params)?)),
            "stark_transfer" => Ok(Self::Transfer(decode(method, params)?)),
            "stark_createOrder" => Ok(Self::CreateOrder(decode(method, params)?)),
            "stark_withdrawal" => Ok(Self::Withdrawal(decode(method, params)?)),
            "stark_fullWithdrawal" => Ok(Self::FullWithdrawal(decode(method, params)?)),
            "stark_freeze" => Ok(Self::Freeze(decode(method, params)?)),
            "stark_verifyEscape" => Ok(Self::VerifyEscape(decode(method, params)?)),
            "stark_escape" => Ok(Self::Escape(decode(method, params)?)),
            other => Err(ControllerError::UnknownMethod(other.to_string())),
        }
    }

    /// The wire name of this call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Account(_) => "stark_account",
            Self::Register(_) => "stark_register",
            Self::Deposit(_) => "stark_deposit",
            Self::DepositCancel(_) => "stark_depositCancel",
            Self::DepositReclaim(_) => "stark_depositReclaim",
            Self::Transfer(_) => "stark_transfer",
            Self::CreateOrder(_) => "stark_createOrder",
            Self::Withdrawal(_) => "stark_withdrawal",
            Self::FullWithdrawal(_) => "stark_fullWithdrawal",
            Self::Freeze(_) => "stark_freeze",
            Self::VerifyEscape(_) => "stark_verifyEscape",
            Self::Escape(_) => "stark_escape",
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, ControllerError> {
    serde_json::from_value(params).map_err(|e| ControllerError::InvalidParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
