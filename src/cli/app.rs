//! Wiring shared by the session-aware commands.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use jobboard_cli::api::ApiClient;
use jobboard_cli::auth::{AuthError, CredentialStore, Session, SessionStore};
use jobboard_cli::config::Config;

/// Exit code for input rejected before anything was sent.
const INVALID_INPUT_EXIT: i32 = 2;

/// Global flags that override the config file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Backend URL (overrides api_url from the config)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Push relay address (overrides push_addr from the config)
    #[arg(long, global = true, value_name = "HOST:PORT")]
    pub push_addr: Option<String>,
}

impl Overrides {
    /// Loads the config file and applies the overrides on top.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        if let Some(url) = &self.api_url {
            config.set("api_url", url)?;
        }
        if let Some(addr) = &self.push_addr {
            config.set("push_addr", addr)?;
        }
        Ok(config)
    }
}

/// Loaded configuration plus the backend client and session store built from it.
pub struct App {
    pub config: Config,
    pub api: Arc<ApiClient>,
    pub storage: Arc<CredentialStore>,
    pub store: SessionStore,
}

impl App {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let config = overrides.config()?;
        let data_dir = Config::data_dir()?;

        let api = Arc::new(
            ApiClient::with_timeout(
                &config.api_url,
                Duration::from_secs(config.request_timeout_secs),
            )
            .context("Failed to create backend client")?,
        );
        let storage = Arc::new(CredentialStore::new(config.credential_store, &data_dir));
        let store = SessionStore::new(storage.clone(), api.clone());

        Ok(Self {
            config,
            api,
            storage,
            store,
        })
    }

    /// Restores the stored session.
    ///
    /// Storage errors are reported and leave the session logged out, so
    /// callers always get a ready session back.
    pub async fn restore(&self) -> Session {
        match self.store.restore().await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("Continuing without a session: {e}");
                self.store.session()
            }
        }
    }
}

/// Prints a local validation failure inline and exits.
///
/// Other errors are handed back to the caller.
pub fn check_input(result: Result<(), AuthError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(AuthError::Validation(message)) => {
            eprintln!("{} {}", "✗".red(), message.red());
            std::process::exit(INVALID_INPUT_EXIT);
        }
        Err(e) => Err(e.into()),
    }
}

/// Prompts for a line of visible input.
pub fn prompt_line(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Resolves a password from a flag, stdin, or a hidden prompt.
///
/// With `from_stdin` the first line of standard input is used, for
/// scripts and tests.
pub fn read_password(label: &str, flag: Option<String>, from_stdin: bool) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }

    if from_stdin {
        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .context("Failed to read password from stdin")?;
        return Ok(input.trim_end_matches(['\r', '\n']).to_string());
    }

    print!("{label} (hidden input): ");
    io::stdout().flush()?;
    rpassword::read_password().context("Failed to read password")
}
