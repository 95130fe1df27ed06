//! ECDSA signing over the Stark curve and signature serialization.

use starknet_core::crypto::ecdsa_sign;
use starknet_crypto::{verify, FieldElement};

use crate::error::CryptoError;
use crate::keys::KeyPair;

/// An ECDSA signature over the Stark curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StarkSignature {
    /// First signature scalar.
    pub r: FieldElement,
    /// Second signature scalar.
    pub s: FieldElement,
}

/// Sign a message hash with a key pair. RFC-6979 deterministic: identical
/// (key, message) inputs always produce the identical signature.
pub fn sign_message(
    key_pair: &KeyPair,
    message_hash: &FieldElement,
) -> Result<StarkSignature, CryptoError> {
    let signature = ecdsa_sign(key_pair.private_key(), message_hash)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(StarkSignature {
        r: signature.r,
        s: signature.s,
    })
}

/// Serialize a signature to its wire form: `0x` followed by `r` and `s`,
/// each as 64 hex characters big-endian.
pub fn serialize_signature(signature: &StarkSignature) -> String {
    format!(
        "0x{}{}",
        hex::encode(signature.r.to_bytes_be()),
        hex::encode(signature.s.to_bytes_be())
    )
}

/// Verify a signature against a public identity and message hash.
pub fn verify_signature(
    public_key: &FieldElement,
    message_hash: &FieldElement,
    signature: &StarkSignature,
) -> Result<bool, CryptoError> {
    verify(public_key, message_hash, &signature.r, &signature.s)
        .map_err(|e| CryptoError::Verification(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pair() -> KeyPair {
        KeyPair::from_private_key(FieldElement::from(123_456_789u64))
    }

    #[test]
    fn sign_verify_round_trip() {
        let pair = test_pair();
        let message = FieldElement::from(987_654_321u64);
        let signature = sign_message(&pair, &message).unwrap();
        assert!(verify_signature(&pair.public_key(), &message, &signature).unwrap());
    }

    #[test]
    fn signing_is_deterministic() {
        let pair = test_pair();
        let message = FieldElement::from(42u64);
        let a = sign_message(&pair, &message).unwrap();
        let b = sign_message(&pair, &message).unwrap();
        assert_eq!(serialize_signature(&a), serialize_signature(&b));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let pair = test_pair();
        let other = KeyPair::from_private_key(FieldElement::from(99u64));
        let message = FieldElement::from(42u64);
        let signature = sign_message(&pair, &message).unwrap();
        assert!(!verify_signature(&other.public_key(), &message, &signature).unwrap());
    }

    #[test]
    fn serialized_form_is_fixed_width() {
        let pair = test_pair();
        let signature = sign_message(&pair, &FieldElement::ONE).unwrap();
        let serialized = serialize_signature(&signature);
        assert!(serialized.starts_with("0x"));
        assert_eq!(serialized.len(), 2 + 64 + 64);
    }
}
