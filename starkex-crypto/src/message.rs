//! Canonical message hashing for transfers and limit orders.
//!
//! Both message shapes follow the exchange's Pedersen layout: a pair of
//! token/identity words reduced first, then combined with a single packed
//! word carrying vault ids, amounts, nonce and expiration under a fixed bit
//! schedule:
//!
//! ```text
//! w3 = type ·2^31 + vault_a ·2^31 + vault_b ·2^63 + amount_a
//!           ·2^63 + amount_b ·2^31 + nonce ·2^22 + expiration
//! ```
//!
//! Hashing is pure: identical parameters always produce the identical
//! message hash, which is what makes signatures reproducible.

use starknet_crypto::{pedersen_hash, FieldElement};

use crate::error::CryptoError;

const TRANSFER_INSTRUCTION: u64 = 1;
const ORDER_INSTRUCTION: u64 = 0;

const VAULT_BITS: u32 = 31;
const AMOUNT_BITS: u32 = 63;
const NONCE_BITS: u32 = 31;
const EXPIRATION_BITS: u32 = 22;

/// Hash the canonical transfer message.
///
/// # Errors
/// `ValueOutOfRange` if any field does not fit its packed slot.
#[allow(clippy::too_many_arguments)]
pub fn transfer_message_hash(
    token_id: FieldElement,
    receiver_public_key: FieldElement,
    sender_vault_id: u64,
    receiver_vault_id: u64,
    quantized_amount: u64,
    nonce: u64,
    expiration_timestamp: u64,
) -> Result<FieldElement, CryptoError> {
    let packed = pack_message_word(
        TRANSFER_INSTRUCTION,
        check_range(sender_vault_id, VAULT_BITS, "senderVaultId")?,
        check_range(receiver_vault_id, VAULT_BITS, "receiverVaultId")?,
        check_range(quantized_amount, AMOUNT_BITS, "quantizedAmount")?,
        0,
        check_range(nonce, NONCE_BITS, "nonce")?,
        check_range(expiration_timestamp, EXPIRATION_BITS, "expirationTimestamp")?,
    );
    Ok(pedersen_hash(
        &pedersen_hash(&token_id, &receiver_public_key),
        &packed,
    ))
}

/// Hash the canonical limit-order message.
///
/// # Errors
/// `ValueOutOfRange` if any field does not fit its packed slot.
#[allow(clippy::too_many_arguments)]
pub fn limit_order_message_hash(
    token_sell: FieldElement,
    token_buy: FieldElement,
    vault_sell: u64,
    vault_buy: u64,
    amount_sell: u64,
    amount_buy: u64,
    nonce: u64,
    expiration_timestamp: u64,
) -> Result<FieldElement, CryptoError> {
    let packed = pack_message_word(
        ORDER_INSTRUCTION,
        check_range(vault_sell, VAULT_BITS, "vaultSell")?,
        check_range(vault_buy, VAULT_BITS, "vaultBuy")?,
        check_range(amount_sell, AMOUNT_BITS, "amountSell")?,
        check_range(amount_buy, AMOUNT_BITS, "amountBuy")?,
        check_range(nonce, NONCE_BITS, "nonce")?,
        check_range(expiration_timestamp, EXPIRATION_BITS, "expirationTimestamp")?,
    );
    Ok(pedersen_hash(
        &pedersen_hash(&token_sell, &token_buy),
        &packed,
    ))
}

/// Pack the third message word. Inputs are pre-validated against their bit
/// widths, so field arithmetic cannot overlap slots.
fn pack_message_word(
    instruction_type: u64,
    vault_a: u64,
    vault_b: u64,
    amount_a: u64,
    amount_b: u64,
    nonce: u64,
    expiration: u64,
) -> FieldElement {
    let shift = |bits: u32| FieldElement::from(1u64 << bits);
    let mut word = FieldElement::from(instruction_type);
    word = word * shift(VAULT_BITS) + FieldElement::from(vault_a);
    word = word * shift(VAULT_BITS) + FieldElement::from(vault_b);
    word = word * shift(AMOUNT_BITS) + FieldElement::from(amount_a);
    word = word * shift(AMOUNT_BITS) + FieldElement::from(amount_b);
    word = word * shift(NONCE_BITS) + FieldElement::from(nonce);
    word * shift(EXPIRATION_BITS) + FieldElement::from(expiration)
}

fn check_range(value: u64, bits: u32, field: &'static str) -> Result<u64, CryptoError> {
    if value >> bits != 0 {
        return Err(CryptoError::ValueOutOfRange { field });
    }
    Ok(value)
}
