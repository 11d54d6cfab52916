//! Authentication and session lifecycle.
//!
//! Holds the client-side record of who is logged in: the bearer token,
//! the role it was issued for and the profile fetched for that role.
//!
//! # Submodules
//!
//! - `role` - Role variants and the role lookup tables
//! - `token` - JWT claim decoding and expiry checks
//! - `storage` - Durable token/role storage (keychain + fallback)
//! - `session` - Session state and the store that drives it

pub mod role;
pub mod session;
pub mod storage;
pub mod token;

pub use role::Role;
pub use session::{Profile, Session, SessionStatus, SessionStore};
pub use storage::{CredentialStore, MemoryStorage, SessionStorage, StoredSession};
pub use token::{decode_claims, is_expired, Claims};

/// Service name for keyring storage.
pub const KEYRING_SERVICE: &str = "jobboard";

/// Keyring entry holding the bearer token.
pub const KEYRING_TOKEN_USER: &str = "token";

/// Keyring entry holding the role string.
pub const KEYRING_ROLE_USER: &str = "role";

/// Error type for authentication and backend operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token is stored.
    #[error("Not logged in. Run 'jobboard login' first.")]
    NotLoggedIn,

    /// The backend rejected the credentials (401/403).
    #[error("Authorization rejected by server ({status})")]
    Unauthorized { status: u16 },

    /// The token's expiry claim is in the past or could not be decoded.
    #[error("Session token is expired or malformed")]
    TokenExpired,

    /// The role string is not one of user, company or admin.
    #[error("Unrecognized role: {0}")]
    UnknownRole(String),

    /// HTTP transport error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success response.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Keyring or credential file error.
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// Form input rejected before it reached the server.
    #[error("{0}")]
    Validation(String),
}

impl AuthError {
    /// Returns true for errors that invalidate the session (401/403).
    pub fn is_authorization(&self) -> bool {
        matches!(self, AuthError::Unauthorized { .. })
    }

    /// Maps an HTTP status and body into the matching error.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 401 || status == 403 {
            return AuthError::Unauthorized { status };
        }

        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.trim().to_string()
                }
            });

        AuthError::ServerError { status, message }
    }
}
