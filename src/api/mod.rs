//! Job board backend API.
//!
//! The session store and notification center talk to the backend through
//! the `ProfileSource` and `NotificationApi` traits; `ApiClient` is the
//! HTTP implementation of both.
//!
//! # Submodules
//!
//! - `client` - reqwest-based client for the REST endpoints

pub mod client;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::auth::{AuthError, Profile, Role};
use crate::notifications::NotificationRecord;

pub use client::ApiClient;

/// Minimum accepted password length for registration and reset forms.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Fetches the profile of the account behind a token.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, token: &str, role: &Role) -> Result<Profile, AuthError>;
}

/// Backend operations on the current user's notifications.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list_notifications(&self, token: &str) -> Result<Vec<NotificationRecord>, AuthError>;

    async fn mark_notification_read(&self, token: &str, id: &str) -> Result<(), AuthError>;

    async fn mark_all_notifications_read(&self, token: &str) -> Result<(), AuthError>;

    async fn delete_notification(&self, token: &str, id: &str) -> Result<(), AuthError>;

    async fn clear_notifications(&self, token: &str) -> Result<(), AuthError>;
}

// ==================== API Types ====================

/// Response from login and registration endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub role: Option<Role>,

    /// Profile of the logged-in account; some endpoints call it `user`,
    /// others `profile`.
    #[serde(default, alias = "profile")]
    pub user: Option<Profile>,

    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    /// Role from the response, then the profile, then the token claims.
    pub fn resolved_role(&self) -> Option<Role> {
        self.role
            .clone()
            .or_else(|| self.user.as_ref().and_then(|u| u.role.clone()))
            .or_else(|| {
                self.token
                    .as_deref()
                    .and_then(crate::auth::decode_claims)
                    .and_then(|c| c.role)
                    .map(|r| Role::parse(&r))
            })
    }
}

/// Response carrying only a human-readable message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// The notification list endpoint returns either a bare array or a wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NotificationList {
    Bare(Vec<NotificationRecord>),
    Wrapped { notifications: Vec<NotificationRecord> },
}

impl NotificationList {
    pub(crate) fn into_records(self) -> Vec<NotificationRecord> {
        match self {
            NotificationList::Bare(records) => records,
            NotificationList::Wrapped { notifications } => notifications,
        }
    }
}

/// Login form.
#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        Ok(())
    }
}

/// Registration form shared by all three roles.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,

    /// Role-specific fields (e.g. `industry` for companies).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Registration endpoint for a role.
pub fn register_path(role: &Role) -> Option<&'static str> {
    match role {
        Role::User => Some("/api/auth/register-user"),
        Role::Company => Some("/api/auth/register-company"),
        Role::Admin => Some("/api/auth/register-admin"),
        Role::Unknown(_) => None,
    }
}

/// Loose email shape check; the backend does the real validation.
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

static EMAIL: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN));

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }
    let pattern = EMAIL
        .as_ref()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    if !pattern.is_match(email.trim()) {
        return Err(AuthError::Validation(format!(
            "'{}' is not a valid email address",
            email.trim()
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
