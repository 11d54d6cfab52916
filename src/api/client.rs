//! HTTP client for the job board backend.
//!
//! Provides `ApiClient` for the auth, profile and notification endpoints.
//! Authenticated calls take the bearer token explicitly so one client can
//! outlive any number of logins.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{
    register_path, AuthResponse, LoginForm, MessageResponse, NotificationApi, NotificationList,
    ProfileSource, RegistrationForm,
};
use crate::auth::{AuthError, Profile, Role};
use crate::config::DEFAULT_API_URL;
use crate::notifications::NotificationRecord;

/// Backend API client.
pub struct ApiClient {
    /// HTTP client instance.
    client: Client,
    /// Base URL of the backend.
    base_url: String,
}

impl ApiClient {
    /// Creates a client for the default URL.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_API_URL)
    }

    /// Creates a client for a custom URL.
    pub fn with_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a client with a per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of one notification, with `id` escaped as a single path segment.
    fn notification_url(&self, id: &str, action: Option<&str>) -> Result<Url, AuthError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(AuthError::Validation(format!(
                "'{id}' is not a valid notification id"
            )));
        }
        let mut url = Url::parse(&self.url("/api/notifications"))
            .map_err(|e| AuthError::Validation(format!("Invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| AuthError::Validation(format!("Invalid API URL: {}", self.base_url)))?
            .push(id)
            .extend(action);
        Ok(url)
    }

    /// Sends a request and decodes a JSON body, mapping non-2xx statuses.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }

    /// Sends a request whose response body is ignored.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), AuthError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status.as_u16(), &body));
        }
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {token}"))
    }

    /// Exchanges credentials for a token.
    pub async fn login(&self, form: &LoginForm) -> Result<AuthResponse, AuthError> {
        form.validate()?;
        tracing::debug!(email = %form.email, "logging in");

        let request = self.client.post(self.url("/api/auth/login")).json(form);
        let response: AuthResponse = self.send_json(request).await?;
        if response.token.is_none() {
            return Err(AuthError::ServerError {
                status: 200,
                message: "Login response did not include a token".to_string(),
            });
        }
        Ok(response)
    }

    /// Registers an account for the given role.
    pub async fn register(
        &self,
        role: &Role,
        form: &RegistrationForm,
    ) -> Result<AuthResponse, AuthError> {
        let path = register_path(role).ok_or_else(|| AuthError::UnknownRole(role.to_string()))?;
        form.validate()?;
        tracing::debug!(%role, email = %form.email, "registering account");

        let request = self.client.post(self.url(path)).json(form);
        self.send_json(request).await
    }

    /// Asks the backend to email a password reset link.
    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, AuthError> {
        super::validate_email(email)?;
        let request = self
            .client
            .post(self.url("/api/auth/request-password-reset"))
            .json(&serde_json::json!({ "email": email.trim() }));
        self.send_json(request).await
    }

    /// Sets a new password using the token from the reset email.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &str,
    ) -> Result<MessageResponse, AuthError> {
        if reset_token.trim().is_empty() {
            return Err(AuthError::Validation("Reset token is required".to_string()));
        }
        super::validate_password(password)?;

        let request = self
            .client
            .post(self.url("/api/auth/reset-password"))
            .json(&serde_json::json!({ "token": reset_token.trim(), "password": password }));
        self.send_json(request).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileSource for ApiClient {
    async fn fetch_profile(&self, token: &str, role: &Role) -> Result<Profile, AuthError> {
        let path = role
            .profile_path()
            .ok_or_else(|| AuthError::UnknownRole(role.to_string()))?;
        let request = self.authorized(self.client.get(self.url(&path)), token);
        self.send_json(request).await
    }
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list_notifications(&self, token: &str) -> Result<Vec<NotificationRecord>, AuthError> {
        let request = self.authorized(self.client.get(self.url("/api/notifications")), token);
        let list: NotificationList = self.send_json(request).await?;
        Ok(list.into_records())
    }

    async fn mark_notification_read(&self, token: &str, id: &str) -> Result<(), AuthError> {
        let url = self.notification_url(id, Some("read"))?;
        self.send_empty(self.authorized(self.client.put(url), token))
            .await
    }

    async fn mark_all_notifications_read(&self, token: &str) -> Result<(), AuthError> {
        let url = self.url("/api/notifications/read-all");
        self.send_empty(self.authorized(self.client.put(url), token))
            .await
    }

    async fn delete_notification(&self, token: &str, id: &str) -> Result<(), AuthError> {
        let url = self.notification_url(id, None)?;
        self.send_empty(self.authorized(self.client.delete(url), token))
            .await
    }

    async fn clear_notifications(&self, token: &str) -> Result<(), AuthError> {
        let url = self.url("/api/notifications");
        self.send_empty(self.authorized(self.client.delete(url), token))
            .await
    }
}
