//! Replay Guard
//!
//! Pure freshness checks shared by every attestation path. Persistence of the
//! last accepted nonce and of one-time bot nonces lives in the store; these
//! functions only judge the values they are given.

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::U256;

/// Validity window for signed bot requests, in seconds either side of now
pub const BOT_REQUEST_WINDOW_SECS: i64 = 300;

/// Expired when `expires_at <= now`; equality counts as expired
pub fn is_expired(expires_at: u64, now: u64) -> bool {
    expires_at <= now
}

pub fn assert_not_expired(expires_at: u64, now: u64) -> ProtocolResult<()> {
    if is_expired(expires_at, now) {
        return Err(ProtocolError::Expired { expires_at, now });
    }
    Ok(())
}

/// Accept when there is no previous nonce or `incoming > last`
pub fn assert_nonce_strictly_increases(last: Option<U256>, incoming: U256) -> ProtocolResult<()> {
    match last {
        Some(last) if incoming <= last => Err(ProtocolError::NonceNotIncreasing {
            last: last.to_string(),
            incoming: incoming.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Reject request timestamps further than `window_secs` from `now`
pub fn assert_timestamp_within_window(
    timestamp: i64,
    now: i64,
    window_secs: i64,
) -> ProtocolResult<()> {
    if timestamp.abs_diff(now) > window_secs.unsigned_abs() {
        return Err(ProtocolError::TimestampSkew {
            timestamp,
            now,
            window_secs,
        });
    }
    Ok(())
}
