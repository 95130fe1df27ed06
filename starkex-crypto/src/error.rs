//! Error types for the crypto crate.

use thiserror::Error;

/// Aggregated error type for key derivation, hashing and signing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A value could not be interpreted as a Stark field element.
    #[error("invalid field element {value:?}: {reason}")]
    InvalidFieldElement {
        /// The offending input, verbatim.
        value: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The owner address used to build an account path is malformed.
    #[error("invalid owner address: {0:?}")]
    InvalidAddress(String),

    /// A message field does not fit its slot in the packed message word.
    #[error("{field} out of range for message packing")]
    ValueOutOfRange {
        /// Name of the offending message field.
        field: &'static str,
    },

    /// Key grinding failed to produce a valid scalar.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// ECDSA signing error.
    #[error("signing error: {0}")]
    Signing(String),

    /// ECDSA verification error (malformed signature or key, not a mere
    /// mismatch).
    #[error("verification error: {0}")]
    Verification(String),
}
