//! Wire-level parsing and formatting of Stark field elements.
//!
//! The RPC surface carries field elements as strings: `0x`-prefixed hex for
//! keys and addresses, plain decimal for vault ids and amounts. Formatting is
//! always fixed-width hex so that serialized values are byte-stable.

use starknet_crypto::FieldElement;

use crate::error::CryptoError;

/// Parse a field element from its wire representation.
///
/// Accepts `0x`-prefixed hex or plain decimal. Anything else is rejected.
pub fn parse_felt(value: &str) -> Result<FieldElement, CryptoError> {
    let trimmed = value.trim();
    if let Some(hex_part) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return FieldElement::from_hex_be(hex_part).map_err(|e| {
            CryptoError::InvalidFieldElement {
                value: value.to_string(),
                reason: e.to_string(),
            }
        });
    }
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return FieldElement::from_dec_str(trimmed).map_err(|e| {
            CryptoError::InvalidFieldElement {
                value: value.to_string(),
                reason: e.to_string(),
            }
        });
    }
    Err(CryptoError::InvalidFieldElement {
        value: value.to_string(),
        reason: "expected 0x-prefixed hex or decimal".to_string(),
    })
}

/// Format a field element as `0x`-prefixed hex, zero-padded to 32 bytes.
pub fn felt_to_hex(value: &FieldElement) -> String {
    format!("0x{}", hex::encode(value.to_bytes_be()))
}
