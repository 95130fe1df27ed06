//! Unsigned exchange-contract transaction building.
//!
//! The controller never signs or submits on-chain transactions; it only
//! assembles call payloads for the exchange contract's fixed method table.
//! Submission (and the wallet signature it needs) is the caller's
//! responsibility.

use serde::{Deserialize, Serialize};
use starknet_core::utils::get_selector_from_name;

use starkex_crypto::{felt_to_hex, parse_felt};

use crate::error::ControllerError;

/// The exchange contract's method table. Dispatch routes only to these, so
/// an unknown name here is an internal misuse, not caller input.
const EXCHANGE_METHODS: &[&str] = &[
    "register",
    "deposit",
    "depositCancel",
    "depositReclaim",
    "withdraw",
    "fullWithdrawalRequest",
    "freezeRequest",
    "verifyEscape",
    "escape",
];

/// A fully assembled on-chain call payload lacking only the caller's wallet
/// signature and submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    /// Address of the exchange contract.
    pub contract_address: String,
    /// Contract method name.
    pub method: String,
    /// Entry point selector for the method.
    pub selector: String,
    /// Call arguments, already encoded for the wire.
    pub calldata: Vec<String>,
}

/// Build an unsigned transaction for `method` with pre-encoded `calldata`.
pub fn build_transaction(
    contract_address: &str,
    method: &str,
    calldata: Vec<String>,
) -> Result<UnsignedTransaction, ControllerError> {
    if !EXCHANGE_METHODS.contains(&method) {
        return Err(ControllerError::UnknownContractMethod(method.to_string()));
    }
    let selector = get_selector_from_name(method)
        .map_err(|_| ControllerError::UnknownContractMethod(method.to_string()))?;
    Ok(UnsignedTransaction {
        contract_address: contract_address.to_string(),
        method: method.to_string(),
        selector: felt_to_hex(&selector),
        calldata,
    })
}

/// Normalize a wire argument (hex or decimal) into fixed-width hex calldata.
pub fn encode_felt_arg(field: &'static str, value: &str) -> Result<String, ControllerError> {
    let felt = parse_felt(value).map_err(|e| ControllerError::InvalidArgument {
        field,
        reason: e.to_string(),
    })?;
    Ok(felt_to_hex(&felt))
}
