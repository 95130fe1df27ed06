//! starkex-crypto
//!
//! Pure, deterministic primitives for the StarkEx controller:
//!
//! - Path-addressed key derivation over the Stark curve: one master secret
//!   and an EIP-2645-style account path always yield the same key pair.
//! - Stable token-id hashing of structured token descriptors.
//! - Canonical transfer and limit-order message hashing (Pedersen over a
//!   packed message word).
//! - RFC-6979 ECDSA signing with fixed-width signature serialization.
//!
//! Nothing in this crate performs I/O or holds shared state; all state
//! management lives in `starkex-controller`.

pub mod error;
pub mod felt;
pub mod keys;
pub mod message;
pub mod sign;
pub mod token;

pub use error::CryptoError;
pub use felt::{felt_to_hex, parse_felt};
pub use keys::{account_path, derive_key_pair, KeyPair};
pub use message::{limit_order_message_hash, transfer_message_hash};
pub use sign::{serialize_signature, sign_message, verify_signature, StarkSignature};
pub use token::{hash_token_id, TokenDescriptor};

pub use starknet_crypto::FieldElement;
