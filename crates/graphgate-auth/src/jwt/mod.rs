//! JWT helpers: signing key sets and unverified claim decoding

mod jwks;

pub use jwks::{DEFAULT_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL, JwksClient, JwksError};

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::Rejection;

/// Decoded JWT payload
pub type ClaimMap = serde_json::Map<String, serde_json::Value>;

/// Decode the payload of a compact JWS without checking its signature
///
/// Used by the claims-only strategy and by diagnostics. The result must not be
/// treated as authenticated.
///
/// # Errors
///
/// Returns [`Rejection::Empty`] for an empty string and
/// [`Rejection::Malformed`] when the token is not three dot-separated
/// segments or the payload is not a base64url JSON object.
pub fn decode_unverified(token: &str) -> Result<ClaimMap, Rejection> {
    if token.is_empty() {
        return Err(Rejection::Empty);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Rejection::Malformed(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| Rejection::Malformed(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| Rejection::Malformed(format!("payload is not a JSON object: {e}")))
}

/// Current time in seconds since the epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
