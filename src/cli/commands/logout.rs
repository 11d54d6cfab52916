//! Logout command - forget the stored session.
//!
//! Deletes the token and role from the keychain and the fallback
//! session file.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::app::{App, Overrides};
use jobboard_cli::auth::SessionStorage;

/// Arguments for the logout command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard logout            Log out of the job board")]
pub struct Args {}

/// Executes the logout command.
pub fn run(_args: Args, overrides: &Overrides) -> Result<()> {
    let app = App::load(overrides)?;

    let stored = app
        .storage
        .load()
        .context("Failed to check login status")?;
    if stored.is_empty() {
        println!("{}", "Not currently logged in.".yellow());
        return Ok(());
    }

    app.store.logout().context("Failed to clear stored session")?;
    match stored.role {
        Some(role) => println!("Logged out ({role})"),
        None => println!("Logged out"),
    }

    Ok(())
}
