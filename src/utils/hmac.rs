//! HMAC-SHA256 signature generation and validation for sync envelopes.
//!
//! The signed message is `"{timestamp}.{canonical payload}"` with the
//! timestamp rendered in decimal.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded SHA-256 digest
pub const SIGNATURE_HEX_LEN: usize = 64;

/// The HMAC key was rejected by the MAC implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid secret key: {0}")]
pub struct InvalidSecretKey(String);

fn keyed_mac(secret: &[u8], payload: &[u8], timestamp: u64) -> Result<HmacSha256, InvalidSecretKey> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| InvalidSecretKey(e.to_string()))?;

    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Generate the lowercase hex HMAC-SHA256 signature for `payload` at `timestamp`
pub fn generate_signature(
    secret: &[u8],
    payload: &[u8],
    timestamp: u64,
) -> Result<String, InvalidSecretKey> {
    let mac = keyed_mac(secret, payload, timestamp)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` against the expected one in constant time.
///
/// Only the canonical rendering is accepted: exactly 64 lowercase hex
/// characters. Anything else is a mismatch, not an error.
pub fn verify_signature(
    secret: &[u8],
    payload: &[u8],
    timestamp: u64,
    signature: &str,
) -> Result<bool, InvalidSecretKey> {
    if signature.len() != SIGNATURE_HEX_LEN
        || !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Ok(false);
    }

    let Ok(signature_bytes) = hex::decode(signature) else {
        return Ok(false);
    };

    let mac = keyed_mac(secret, payload, timestamp)?;
    Ok(mac.verify_slice(&signature_bytes).is_ok())
}

/// `true` when `timestamp` lies within `tolerance_seconds` of `now`, in either direction
pub fn is_within_replay_window(now: u64, timestamp: u64, tolerance_seconds: u64) -> bool {
    now.abs_diff(timestamp) <= tolerance_seconds
}

/// Current time in whole seconds since the Unix epoch
pub fn current_timestamp() -> Result<u64, SystemTimeError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
}
