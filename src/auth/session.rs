//! Session state and the store that drives it.
//!
//! A `Session` is a plain value; every transition builds a new one and the
//! `SessionStore` publishes it through a `watch` channel so the route guard
//! and the notification center can follow along.
//!
//! # Lifecycle
//!
//! - `restore()` hydrates the session from durable storage and the role's
//!   profile endpoint. It always ends with `ready = true`.
//! - `login()` persists a fresh token and role.
//! - `logout()` clears storage and memory.
//!
//! Each restore runs under its own cancellation token. `login` and `logout`
//! cancel it, and the restore re-checks the token under the same lock before
//! every write, so a slow profile fetch can never resurrect a session that
//! was cleared while the request was in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::role::Role;
use super::storage::SessionStorage;
use super::token::{decode_claims, is_expired, Claims};
use super::AuthError;
use crate::api::ProfileSource;

/// Profile record returned by the role's `/me` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, alias = "_id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Role-specific fields the client does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    /// Display name, falling back to the email and then the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Coarse classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Restore has not finished.
    Loading,
    /// No token.
    Empty,
    /// Token and role are known but the profile could not be fetched.
    Degraded,
    /// Token, role and profile are all present.
    Authenticated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Loading => write!(f, "loading"),
            SessionStatus::Empty => write!(f, "logged out"),
            SessionStatus::Degraded => write!(f, "degraded"),
            SessionStatus::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Client-side record of the current login.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub role: Option<Role>,
    pub profile: Option<Profile>,
    pub ready: bool,
}

impl Session {
    /// Startup state: nothing known, not ready.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Logged-out state after restore or logout.
    pub fn cleared() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    /// Token and role known, profile pending.
    fn with_credentials(token: String, role: Role) -> Self {
        Self {
            token: Some(token),
            role: Some(role),
            profile: None,
            ready: false,
        }
    }

    fn with_profile(mut self, profile: Option<Profile>) -> Self {
        self.profile = profile;
        self
    }

    fn finished(mut self) -> Self {
        self.ready = true;
        self
    }

    fn loading(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn status(&self) -> SessionStatus {
        match (self.ready, &self.token, &self.profile) {
            (false, _, _) => SessionStatus::Loading,
            (true, None, _) => SessionStatus::Empty,
            (true, Some(_), None) => SessionStatus::Degraded,
            (true, Some(_), Some(_)) => SessionStatus::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Decoded claims of the current token.
    pub fn claims(&self) -> Option<Claims> {
        self.token.as_deref().and_then(decode_claims)
    }

    /// User id from the profile, falling back to the token claims.
    pub fn user_id(&self) -> Option<String> {
        self.profile
            .as_ref()
            .map(|p| p.id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| self.claims().and_then(|c| c.user_id().map(str::to_string)))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims().and_then(|c| c.expires_at())
    }
}

/// Owns the session and publishes every transition.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    profiles: Arc<dyn ProfileSource>,
    state: watch::Sender<Session>,
    /// Cancellation token of the current restore cycle.
    cycle: Mutex<CancellationToken>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, profiles: Arc<dyn ProfileSource>) -> Self {
        let (state, _) = watch::channel(Session::empty());
        Self {
            storage,
            profiles,
            state,
            cycle: Mutex::new(CancellationToken::new()),
        }
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    fn publish(&self, session: Session) -> Session {
        self.state.send_replace(session.clone());
        session
    }

    fn current_cycle(&self) -> MutexGuard<'_, CancellationToken> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new restore cycle, cancelling the previous one.
    fn begin_cycle(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current_cycle();
        current.cancel();
        *current = token.clone();
        token
    }

    fn cancel_cycle(&self) {
        self.current_cycle().cancel();
    }

    /// Builds and publishes a session for `cycle` unless it was superseded.
    ///
    /// The cycle lock is held across the check, `build` and the publish.
    /// `login` and `logout` cancel under the same lock, so once either has
    /// started, nothing from the old cycle reaches storage or the channel.
    fn commit(
        &self,
        cycle: &CancellationToken,
        build: impl FnOnce() -> Session,
    ) -> Option<Session> {
        let _current = self.current_cycle();
        if cycle.is_cancelled() {
            tracing::debug!("Restore superseded, discarding its result");
            return None;
        }
        Some(self.publish(build()))
    }

    /// Hydrates the session from storage and the profile endpoint.
    ///
    /// Marks the session not-ready for the duration of the cycle and ready
    /// again exactly once at the end, whatever the outcome. A cycle cut
    /// short by `login` or `logout` returns whatever they published.
    pub async fn restore(&self) -> Result<Session, AuthError> {
        let cycle = self.begin_cycle();
        self.commit(&cycle, || self.session().loading());

        match self.restore_cycle(&cycle).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::error!("Session restore failed: {e}");
                self.commit(&cycle, Session::cleared);
                Err(e)
            }
        }
    }

    async fn restore_cycle(&self, cycle: &CancellationToken) -> Result<Session, AuthError> {
        let stored = self.storage.load()?;

        let Some(token) = stored.token else {
            tracing::debug!("No stored token");
            return Ok(self.commit_or_current(cycle, Session::cleared));
        };

        if is_expired(&token, Utc::now()) {
            tracing::info!("Stored token is expired or malformed, logging out");
            return self.logout_cycle(cycle);
        }

        let role = match stored.role.as_deref().map(Role::parse) {
            Some(role) if role.is_known() => role,
            other => {
                tracing::warn!(role = ?other, "Stored role is missing or unrecognized, clearing session");
                return self.logout_cycle(cycle);
            }
        };

        if self
            .commit(cycle, || Session::with_credentials(token.clone(), role.clone()))
            .is_none()
        {
            return Ok(self.session());
        }

        let fetched = tokio::select! {
            biased;
            _ = cycle.cancelled() => {
                tracing::debug!("Restore superseded before profile arrived");
                return Ok(self.session());
            }
            result = self.profiles.fetch_profile(&token, &role) => result,
        };

        match fetched {
            Ok(profile) => Ok(self.commit_or_current(cycle, || {
                let role = self.reconcile_role(role, &profile);
                tracing::info!(%role, "Session restored");
                Session::with_credentials(token, role)
                    .with_profile(Some(profile))
                    .finished()
            })),
            Err(e) if e.is_authorization() => {
                tracing::warn!("Profile fetch rejected ({e}), logging out");
                self.logout_cycle(cycle)
            }
            Err(e) => {
                tracing::warn!("Profile fetch failed ({e}); keeping token without profile");
                Ok(self.commit_or_current(cycle, || {
                    Session::with_credentials(token, role).finished()
                }))
            }
        }
    }

    fn commit_or_current(
        &self,
        cycle: &CancellationToken,
        build: impl FnOnce() -> Session,
    ) -> Session {
        self.commit(cycle, build).unwrap_or_else(|| self.session())
    }

    /// Logs out on behalf of `cycle`, unless it was superseded.
    fn logout_cycle(&self, cycle: &CancellationToken) -> Result<Session, AuthError> {
        let current = self.current_cycle();
        if cycle.is_cancelled() {
            drop(current);
            return Ok(self.session());
        }
        current.cancel();
        self.clear()
    }

    /// Applies the role invariant: the profile's role wins and is persisted.
    fn reconcile_role(&self, stored: Role, profile: &Profile) -> Role {
        match &profile.role {
            Some(actual) if actual.is_known() && *actual != stored => {
                tracing::info!(stored = %stored, actual = %actual, "Role mismatch, adopting profile role");
                if let Err(e) = self.storage.store_role(actual.as_str()) {
                    tracing::warn!("Failed to persist corrected role: {e}");
                }
                actual.clone()
            }
            _ => stored,
        }
    }

    /// Persists a new token and role and publishes the ready session.
    ///
    /// An expired or malformed token logs the session out and returns
    /// `AuthError::TokenExpired`.
    pub fn login(
        &self,
        token: &str,
        role: Role,
        profile: Option<Profile>,
    ) -> Result<Session, AuthError> {
        self.cancel_cycle();

        if !role.is_known() {
            return Err(AuthError::UnknownRole(role.to_string()));
        }

        if is_expired(token, Utc::now()) {
            tracing::warn!("Refusing expired or malformed token at login");
            self.logout()?;
            return Err(AuthError::TokenExpired);
        }

        let role = match &profile {
            Some(p) => match &p.role {
                Some(actual) if actual.is_known() => actual.clone(),
                _ => role,
            },
            None => role,
        };

        self.storage.store(token, role.as_str())?;
        tracing::info!(%role, "Logged in");

        Ok(self.publish(
            Session::with_credentials(token.to_string(), role)
                .with_profile(profile)
                .finished(),
        ))
    }

    /// Clears storage and memory and publishes the logged-out session.
    ///
    /// The in-memory session is cleared even when storage fails.
    pub fn logout(&self) -> Result<Session, AuthError> {
        self.cancel_cycle();
        self.clear()
    }

    fn clear(&self) -> Result<Session, AuthError> {
        let cleared = self.storage.clear();
        let session = self.publish(Session::cleared());
        tracing::info!("Logged out");
        cleared.map(|()| session)
    }

    /// Logs out when the current token has expired at `now`.
    ///
    /// Returns whether the session was cleared.
    pub fn check_expiry(&self, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let expired = match self.state.borrow().token.as_deref() {
            Some(token) => is_expired(token, now),
            None => false,
        };

        if expired {
            tracing::info!("Session token expired");
            self.logout()?;
        }
        Ok(expired)
    }
}
