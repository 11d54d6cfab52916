//! JWT claim decoding.
//!
//! The client never verifies signatures; it only reads the payload to
//! learn when the token expires and which user it was issued to. A token
//! that cannot be decoded is treated as expired.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The subset of JWT claims the client reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    /// User id as issued by the backend.
    #[serde(default, alias = "_id", alias = "userId")]
    pub id: Option<String>,

    /// Standard subject claim.
    #[serde(default)]
    pub sub: Option<String>,

    /// Role embedded in the token, if any.
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// Returns the user id, preferring `id` over `sub`.
    pub fn user_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.sub.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Decodes the payload segment of a JWT.
///
/// Returns `None` when the token does not have three segments, the payload
/// is not base64url, or the JSON lacks a numeric `exp`.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Returns true when the token is expired at `now` or cannot be decoded.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Some(claims) => now.timestamp() >= claims.exp,
        None => true,
    }
}

/// Builds an unsigned token with the given payload. Test helper.
#[cfg(test)]
pub(crate) fn unsigned_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}
