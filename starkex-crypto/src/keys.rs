//! Deterministic key derivation over the Stark curve.
//!
//! A single master secret plus an account path produce one key pair, always
//! the same one. Paths follow the EIP-2645 layout used by layer-2 exchanges:
//! `m/2645'/<layer>'/<application>'/<address lo>'/<address hi>'/<index>`,
//! where the layer and application segments are 31-bit hashes of their names
//! and the address segments are the low 62 bits of the owning address.
//!
//! The private scalar is ground out of SHA-256 with rejection sampling
//! against the curve order, so scalars are uniform and always valid.

use std::fmt;

use sha2::{Digest, Sha256};
use starknet_crypto::{get_public_key, FieldElement};

use crate::error::CryptoError;
use crate::felt::{felt_to_hex, parse_felt};

/// Order of the Stark curve subgroup, big-endian. Ground scalars must be in
/// `[1, n)`.
const CURVE_ORDER_BE: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xb7, 0x81, 0x12, 0x6d, 0xca, 0xe7, 0xb2, 0x32,
    0x1e, 0x66, 0xa2, 0x41, 0xad, 0xc6, 0x4d, 0x2f,
];

/// Domain separator for key grinding.
const GRIND_DOMAIN: &[u8] = b"starkex-key-derivation:v1";

/// Upper bound on grinding attempts. Each attempt succeeds with probability
/// ~1/32, so exhaustion is unreachable in practice.
const MAX_GRIND_ATTEMPTS: u32 = 1024;

const MASK_31: u64 = (1 << 31) - 1;

/// A Stark curve key pair. The private scalar is held in memory only; it is
/// surfaced solely through [`KeyPair::private_key_hex`] for persistence by
/// the account key store.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_key: FieldElement,
    public_key: FieldElement,
}

impl KeyPair {
    /// Build a key pair from a raw private scalar.
    pub fn from_private_key(private_key: FieldElement) -> Self {
        let public_key = get_public_key(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Reconstruct a key pair from the persisted hex form of its scalar.
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, CryptoError> {
        Ok(Self::from_private_key(parse_felt(private_key_hex)?))
    }

    /// The public identity (stark public key) of this pair.
    pub fn public_key(&self) -> FieldElement {
        self.public_key
    }

    /// The private scalar, hex-encoded for persistence.
    pub fn private_key_hex(&self) -> String {
        felt_to_hex(&self.private_key)
    }

    pub(crate) fn private_key(&self) -> &FieldElement {
        &self.private_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &felt_to_hex(&self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Build the account path for a (layer, application, owner address, index)
/// tuple.
///
/// # Errors
/// Returns `InvalidAddress` if the owner address is not hex.
pub fn account_path(
    layer: &str,
    application: &str,
    owner_address: &str,
    index: u32,
) -> Result<String, CryptoError> {
    let addr = owner_address
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if addr.is_empty() || !addr.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidAddress(owner_address.to_string()));
    }
    // Low 62 bits of the address, split into two 31-bit hardened segments.
    let tail = &addr[addr.len().saturating_sub(16)..];
    let addr_bits = u64::from_str_radix(tail, 16)
        .map_err(|_| CryptoError::InvalidAddress(owner_address.to_string()))?;
    let addr_lo = addr_bits & MASK_31;
    let addr_hi = (addr_bits >> 31) & MASK_31;

    Ok(format!(
        "m/2645'/{}'/{}'/{}'/{}'/{}",
        hash_31(layer),
        hash_31(application),
        addr_lo,
        addr_hi,
        index
    ))
}

/// Derive the key pair for a path from the master secret. Deterministic:
/// identical inputs always yield the identical pair.
pub fn derive_key_pair(
    master_secret: &[u8],
    path: &str,
) -> Result<KeyPair, CryptoError> {
    let scalar = grind_key(master_secret, path)?;
    Ok(KeyPair::from_private_key(scalar))
}

/// Grind a private scalar out of (master secret, path): hash with an
/// incrementing attempt counter until the digest lands in `[1, n)`.
fn grind_key(master_secret: &[u8], path: &str) -> Result<FieldElement, CryptoError> {
    for attempt in 0..MAX_GRIND_ATTEMPTS {
        let mut hasher = Sha256::new();
        hasher.update(GRIND_DOMAIN);
        hasher.update([b'|']);
        hasher.update(master_secret);
        hasher.update([b'|']);
        hasher.update(path.as_bytes());
        hasher.update([b'|']);
        hasher.update(attempt.to_be_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        if digest == [0u8; 32] || digest >= CURVE_ORDER_BE {
            continue;
        }
        return FieldElement::from_bytes_be(&digest)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()));
    }
    Err(CryptoError::KeyDerivation(
        "exhausted grinding attempts".to_string(),
    ))
}

/// Low 31 bits of SHA-256 of a name, as used for path segments.
fn hash_31(name: &str) -> u32 {
    let digest = Sha256::digest(name.as_bytes());
    u32::from_be_bytes([digest[28], digest[29], digest[30], digest[31]]) & 0x7fff_ffff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let path = account_path("starkex", "starkexdvf", "0xabcdef0123456789", 0)
            .unwrap();
        let a = derive_key_pair(b"seed", &path).unwrap();
        let b = derive_key_pair(b"seed", &path).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.private_key_hex(), b.private_key_hex());
    }

    #[test]
    fn different_paths_yield_different_keys() {
        let p0 = account_path("starkex", "starkexdvf", "0xabcdef0123456789", 0)
            .unwrap();
        let p1 = account_path("starkex", "starkexdvf", "0xabcdef0123456789", 1)
            .unwrap();
        assert_ne!(p0, p1);
        let a = derive_key_pair(b"seed", &p0).unwrap();
        let b = derive_key_pair(b"seed", &p1).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn different_seeds_yield_different_keys() {
        let path = account_path("starkex", "starkexdvf", "0xabcdef0123456789", 0)
            .unwrap();
        let a = derive_key_pair(b"seed-a", &path).unwrap();
        let b = derive_key_pair(b"seed-b", &path).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn path_has_expected_shape() {
        let path =
            account_path("starkex", "starkexdvf", "0xAbCdEf0123456789", 7).unwrap();
        let segments: Vec<&str> = path.split('/').collect();
        assert_eq!(segments.len(), 7);
        assert_eq!(segments[0], "m");
        assert_eq!(segments[1], "2645'");
        assert_eq!(segments[6], "7");
        // Address case must not matter.
        let lower =
            account_path("starkex", "starkexdvf", "0xabcdef0123456789", 7).unwrap();
        assert_eq!(path, lower);
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(account_path("starkex", "starkexdvf", "", 0).is_err());
        assert!(account_path("starkex", "starkexdvf", "0xnot-hex", 0).is_err());
    }

    #[test]
    fn round_trips_through_hex() {
        let pair = derive_key_pair(b"seed", "m/2645'/1'/2'/3'/4'/5").unwrap();
        let restored = KeyPair::from_private_key_hex(&pair.private_key_hex()).unwrap();
        assert_eq!(restored.public_key(), pair.public_key());
    }

    #[test]
    fn debug_redacts_private_key() {
        let pair = KeyPair::from_private_key(FieldElement::from(42u64));
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&pair.private_key_hex()));
    }
}
