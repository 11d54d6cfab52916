//! Password command - request and complete password resets.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use crate::cli::app::{check_input, read_password, App, Overrides};
use jobboard_cli::api::{validate_email, validate_password};

/// Arguments for the password command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard password request ada@example.com   Email a reset link\n    \
    jobboard password reset <TOKEN>             Set a new password")]
pub struct Args {
    #[command(subcommand)]
    pub command: PasswordCommand,
}

#[derive(Subcommand)]
pub enum PasswordCommand {
    /// Ask the backend to email a reset link
    Request { email: String },
    /// Set a new password with the token from the reset email
    Reset {
        token: String,

        /// New password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Read the new password from the first line of stdin
        #[arg(long, conflicts_with = "password")]
        password_stdin: bool,
    },
}

pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let app = App::load(overrides)?;

    match args.command {
        PasswordCommand::Request { email } => {
            check_input(validate_email(&email))?;
            let response = app
                .api
                .request_password_reset(&email)
                .await
                .context("Password reset request failed")?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| format!("Reset link sent to {email}"))
                    .green()
            );
        }
        PasswordCommand::Reset {
            token,
            password,
            password_stdin,
        } => {
            let prompted = password.is_none() && !password_stdin;
            let password = read_password("New password", password, password_stdin)?;
            check_input(validate_password(&password))?;
            if prompted {
                let confirm = read_password("Confirm password", None, false)?;
                if confirm != password {
                    bail!("Passwords do not match");
                }
            }
            let response = app
                .api
                .reset_password(&token, &password)
                .await
                .context("Password reset failed")?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Password updated. You can now log in.".to_string())
                    .green()
            );
        }
    }
    Ok(())
}
