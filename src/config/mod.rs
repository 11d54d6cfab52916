//! Configuration management.
//!
//! Settings live in `<data dir>/config.yaml`. The data directory is
//! `$JOBBOARD_HOME` when set, otherwise `~/.jobboard`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "JOBBOARD_HOME";

/// Default backend URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default push relay address.
pub const DEFAULT_PUSH_ADDR: &str = "127.0.0.1:5001";

/// Keys accepted by `config get` / `config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "api_url",
    "push_addr",
    "request_timeout_secs",
    "credential_store",
];

/// Where the session token and role are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keychain when available, file otherwise.
    #[default]
    Auto,
    /// OS keychain only.
    Keyring,
    /// `session.json` in the data directory.
    File,
}

impl std::fmt::Display for CredentialBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialBackend::Auto => write!(f, "auto"),
            CredentialBackend::Keyring => write!(f, "keyring"),
            CredentialBackend::File => write!(f, "file"),
        }
    }
}

impl std::str::FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CredentialBackend::Auto),
            "keyring" => Ok(CredentialBackend::Keyring),
            "file" => Ok(CredentialBackend::File),
            other => bail!("Invalid credential store '{other}' (expected auto, keyring or file)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the job board backend.
    pub api_url: String,

    /// Address of the push relay (host:port).
    pub push_addr: String,

    /// Per-request timeout for backend calls.
    pub request_timeout_secs: u64,

    /// Credential persistence backend.
    pub credential_store: CredentialBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            push_addr: DEFAULT_PUSH_ADDR.to_string(),
            request_timeout_secs: 30,
            credential_store: CredentialBackend::Auto,
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Writes the config file, creating the data directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = serde_saphyr::to_string(self).context("Failed to serialize config")?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_saphyr::from_str(contents)?;
        Ok(config)
    }

    /// Returns the value of a config key as a string.
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "api_url" => Ok(self.api_url.clone()),
            "push_addr" => Ok(self.push_addr.clone()),
            "request_timeout_secs" => Ok(self.request_timeout_secs.to_string()),
            "credential_store" => Ok(self.credential_store.to_string()),
            other => bail!(
                "Unknown config key '{other}'. Valid keys: {}",
                CONFIG_KEYS.join(", ")
            ),
        }
    }

    /// Sets a config key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_url" => {
                let value = value.trim().trim_end_matches('/');
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    bail!("api_url must start with http:// or https://");
                }
                self.api_url = value.to_string();
            }
            "push_addr" => {
                if !value.contains(':') {
                    bail!("push_addr must be host:port");
                }
                self.push_addr = value.trim().to_string();
            }
            "request_timeout_secs" => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid timeout '{value}'"))?;
                if secs == 0 {
                    bail!("request_timeout_secs must be greater than zero");
                }
                self.request_timeout_secs = secs;
            }
            "credential_store" => self.credential_store = value.parse()?,
            other => bail!(
                "Unknown config key '{other}'. Valid keys: {}",
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Returns the data directory (`$JOBBOARD_HOME` or `~/.jobboard`).
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        let dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join(".jobboard");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("config.yaml"))
    }
}
