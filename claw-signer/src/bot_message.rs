//! Bot Request Signatures
//!
//! Bots sign `openfunderse:auth:{botId}:{timestamp}:{nonce}` with EIP-191
//! `personal_sign`. Binding the bot id, the timestamp and the nonce keeps a
//! signature from being reused by another bot or at another time.

use alloy_primitives::Address;

use crate::crypto::parse_signature;
use crate::error::{SignerError, SignerResult};

/// Prefix of every bot request message
pub const BOT_AUTH_PREFIX: &str = "openfunderse:auth";

/// Message a bot signs for one request
pub fn bot_auth_message(bot_id: &str, timestamp: i64, nonce: &str) -> String {
    format!("{BOT_AUTH_PREFIX}:{bot_id}:{timestamp}:{nonce}")
}

/// Recover the EIP-191 signer of a bot request
pub fn recover_bot_signer(
    bot_id: &str,
    timestamp: i64,
    nonce: &str,
    signature: &str,
) -> SignerResult<Address> {
    let signature = parse_signature(signature)?;
    let message = bot_auth_message(bot_id, timestamp, nonce);
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))
}
