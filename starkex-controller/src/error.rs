//! Error types for the controller crate.
//!
//! Handlers propagate these with `?`; the dispatcher in
//! [`crate::controller`] is the single place where they are flattened into
//! the `{id, error}` response envelope. The structured kinds stay available
//! internally for logging and tests.

use starkex_crypto::CryptoError;
use thiserror::Error;

/// Failure raised by a persistence collaborator. Treated as fatal to the
/// current call; the message is propagated verbatim.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Aggregated error type for the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// No key pair is resolvable without an explicit derivation path.
    #[error("no active stark key pair - please provide a derivation path")]
    NoActiveKey,

    /// The claimed stark public key does not match the active key pair.
    /// Always a caller error, never retried.
    #[error("stark public key does not match the active key pair")]
    IdentityMismatch,

    /// The dispatcher received an unrecognized operation name.
    #[error("unknown stark rpc method: {0}")]
    UnknownMethod(String),

    /// Parameters did not decode to the operation's expected shape.
    #[error("invalid params for {method}: {reason}")]
    InvalidParams {
        /// The operation whose parameter shape was violated.
        method: String,
        /// Decode or validation failure detail.
        reason: String,
    },

    /// A single parameter field failed validation after decoding.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Wire name of the offending field.
        field: &'static str,
        /// Validation failure detail.
        reason: String,
    },

    /// The exchange contract has no such method. Internal misuse guard; the
    /// dispatcher only routes to the fixed method table.
    #[error("exchange contract has no method {0:?}")]
    UnknownContractMethod(String),

    /// Persistence collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Crypto-layer failure (derivation, hashing, signing).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Unexpected serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
