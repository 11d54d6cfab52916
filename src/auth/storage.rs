//! Durable storage for the session token and role.
//!
//! Uses the OS keychain when available, with a fallback to a JSON file in
//! the data directory for systems where the keychain is not accessible.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{AuthError, KEYRING_ROLE_USER, KEYRING_SERVICE, KEYRING_TOKEN_USER};
use crate::config::CredentialBackend;

/// The two persisted strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: Option<String>,
    pub role: Option<String>,
}

impl StoredSession {
    pub fn new(token: &str, role: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            role: Some(role.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.role.is_none()
    }
}

/// Durable key-value storage for the session.
pub trait SessionStorage: Send + Sync {
    /// Reads the persisted token and role. Missing values are `None`.
    fn load(&self) -> Result<StoredSession, AuthError>;

    /// Persists token and role, replacing whatever was stored.
    fn store(&self, token: &str, role: &str) -> Result<(), AuthError>;

    /// Overwrites only the role.
    fn store_role(&self, role: &str) -> Result<(), AuthError>;

    /// Removes both values. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), AuthError>;
}

/// Keychain-backed storage with a file fallback.
pub struct CredentialStore {
    /// Whether keyring is used on this system.
    keyring_available: bool,
    /// Fallback file (`<data dir>/session.json`).
    file_path: PathBuf,
}

impl CredentialStore {
    /// Creates a store for the given backend.
    ///
    /// `Auto` probes the OS keychain and falls back to the file.
    pub fn new(backend: CredentialBackend, data_dir: &Path) -> Self {
        let keyring_available = match backend {
            CredentialBackend::Auto => Self::test_keyring_available(),
            CredentialBackend::Keyring => true,
            CredentialBackend::File => false,
        };
        tracing::debug!(keyring_available, "credential store initialized");

        Self {
            keyring_available,
            file_path: data_dir.join("session.json"),
        }
    }

    /// Creates a file-only store at an explicit path.
    pub fn file_only(file_path: PathBuf) -> Self {
        Self {
            keyring_available: false,
            file_path,
        }
    }

    /// Tests whether the keyring is available by attempting a dummy operation.
    fn test_keyring_available() -> bool {
        match Entry::new(KEYRING_SERVICE, "test-availability") {
            // A missing entry is fine; any other error means no usable keychain
            Ok(entry) => matches!(entry.get_password(), Ok(_) | Err(keyring::Error::NoEntry)),
            Err(_) => false,
        }
    }

    pub fn uses_keyring(&self) -> bool {
        self.keyring_available
    }

    // ==================== Keyring operations ====================

    fn keyring_entry(user: &str) -> Result<Entry, AuthError> {
        Entry::new(KEYRING_SERVICE, user).map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn keyring_get(user: &str) -> Result<Option<String>, AuthError> {
        match Self::keyring_entry(user)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    fn keyring_set(user: &str, value: &str) -> Result<(), AuthError> {
        Self::keyring_entry(user)?
            .set_password(value)
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn keyring_delete(user: &str) -> Result<(), AuthError> {
        match Self::keyring_entry(user)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    // ==================== File operations ====================

    fn load_from_file(&self) -> Result<StoredSession, AuthError> {
        if !self.file_path.exists() {
            return Ok(StoredSession::default());
        }

        let json = fs::read_to_string(&self.file_path)
            .map_err(|e| AuthError::Storage(format!("Failed to read session file: {e}")))?;

        serde_json::from_str(&json)
            .map_err(|e| AuthError::Storage(format!("Invalid session file: {e}")))
    }

    fn store_to_file(&self, session: &StoredSession) -> Result<(), AuthError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create data directory: {e}"))
            })?;
        }

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;

        fs::write(&self.file_path, json)
            .map_err(|e| AuthError::Storage(format!("Failed to write session file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.file_path, perms).map_err(|e| {
                AuthError::Storage(format!("Failed to set file permissions: {e}"))
            })?;
        }

        Ok(())
    }

    fn delete_file(&self) -> Result<(), AuthError> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).map_err(|e| {
                AuthError::Storage(format!("Failed to delete session file: {e}"))
            })?;
        }
        Ok(())
    }
}

impl SessionStorage for CredentialStore {
    fn load(&self) -> Result<StoredSession, AuthError> {
        if self.keyring_available {
            let stored = StoredSession {
                token: Self::keyring_get(KEYRING_TOKEN_USER)?,
                role: Self::keyring_get(KEYRING_ROLE_USER)?,
            };
            if !stored.is_empty() {
                return Ok(stored);
            }
        }

        self.load_from_file()
    }

    fn store(&self, token: &str, role: &str) -> Result<(), AuthError> {
        if self.keyring_available {
            Self::keyring_set(KEYRING_TOKEN_USER, token)?;
            Self::keyring_set(KEYRING_ROLE_USER, role)
        } else {
            self.store_to_file(&StoredSession::new(token, role))
        }
    }

    fn store_role(&self, role: &str) -> Result<(), AuthError> {
        if self.keyring_available {
            Self::keyring_set(KEYRING_ROLE_USER, role)
        } else {
            let mut stored = self.load_from_file()?;
            stored.role = Some(role.to_string());
            self.store_to_file(&stored)
        }
    }

    fn clear(&self) -> Result<(), AuthError> {
        if self.keyring_available {
            Self::keyring_delete(KEYRING_TOKEN_USER)?;
            Self::keyring_delete(KEYRING_ROLE_USER)?;
        }

        // Also delete from file
        self.delete_file()
    }
}

/// In-process storage, for embedding and tests.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<&'static str, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-populated with a token and role.
    pub fn with_session(token: &str, role: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(KEYRING_TOKEN_USER, token.to_string());
        values.insert(KEYRING_ROLE_USER, role.to_string());
        Self {
            values: Mutex::new(values),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, String>>, AuthError> {
        self.values
            .lock()
            .map_err(|_| AuthError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<StoredSession, AuthError> {
        let values = self.lock()?;
        Ok(StoredSession {
            token: values.get(KEYRING_TOKEN_USER).cloned(),
            role: values.get(KEYRING_ROLE_USER).cloned(),
        })
    }

    fn store(&self, token: &str, role: &str) -> Result<(), AuthError> {
        let mut values = self.lock()?;
        values.insert(KEYRING_TOKEN_USER, token.to_string());
        values.insert(KEYRING_ROLE_USER, role.to_string());
        Ok(())
    }

    fn store_role(&self, role: &str) -> Result<(), AuthError> {
        self.lock()?.insert(KEYRING_ROLE_USER, role.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.lock()?.clear();
        Ok(())
    }
}
