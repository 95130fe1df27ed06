//! Token descriptors and stable token-id hashing.
//!
//! A token is described on the wire as `{"type": ..., "data": {...}}`. The
//! exchange addresses tokens by a single field element derived from that
//! descriptor; two descriptors with identical semantic content must always
//! hash to the same id, across processes and versions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use starknet_crypto::FieldElement;

use crate::error::CryptoError;

/// Domain separator for token-id hashing.
const TOKEN_ID_DOMAIN: &[u8] = b"starkex-token-id:v1";

/// A structured token descriptor, as carried in operation parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TokenDescriptor {
    /// The chain's native token, with its quantization factor.
    #[serde(rename = "ETH")]
    Eth {
        /// Power-of-ten quantization exponent, as a decimal string.
        quantum: String,
    },
    /// A fungible contract token.
    #[serde(rename = "ERC20")]
    Erc20 {
        /// Power-of-ten quantization exponent, as a decimal string.
        quantum: String,
        /// Contract address of the token.
        #[serde(rename = "tokenAddress")]
        token_address: String,
    },
    /// A non-fungible contract token.
    #[serde(rename = "ERC721")]
    Erc721 {
        /// Token id within the contract, as a decimal string.
        #[serde(rename = "tokenId")]
        token_id: String,
        /// Contract address of the token.
        #[serde(rename = "tokenAddress")]
        token_address: String,
    },
}

impl TokenDescriptor {
    /// Canonical byte encoding fed into the token-id hash. Addresses are
    /// lowercased so that checksummed and plain forms agree.
    fn canonical_encoding(&self) -> String {
        match self {
            Self::Eth { quantum } => format!("ETH|{}", quantum.trim()),
            Self::Erc20 {
                quantum,
                token_address,
            } => format!(
                "ERC20|{}|{}",
                quantum.trim(),
                token_address.trim().to_ascii_lowercase()
            ),
            Self::Erc721 {
                token_id,
                token_address,
            } => format!(
                "ERC721|{}|{}",
                token_id.trim(),
                token_address.trim().to_ascii_lowercase()
            ),
        }
    }
}

/// Hash a token descriptor into its on-exchange token id.
///
/// The digest is masked to 250 bits so the result is always a canonical
/// field element.
pub fn hash_token_id(token: &TokenDescriptor) -> Result<FieldElement, CryptoError> {
    let mut hasher = Sha256::new();
    hasher.update(TOKEN_ID_DOMAIN);
    hasher.update([b'|']);
    hasher.update(token.canonical_encoding().as_bytes());
    let mut digest: [u8; 32] = hasher.finalize().into();
    digest[0] &= 0x03; // keep 250 bits

    FieldElement::from_bytes_be(&digest).map_err(|e| CryptoError::InvalidFieldElement {
        value: token.canonical_encoding(),
        reason: e.to_string(),
    })
}
