//! Login command - authenticate with the job board backend.
//!
//! Exchanges email and password for a bearer token, resolves the account
//! role and profile, and stores token and role in the OS keychain or the
//! fallback session file.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::cli::app::{check_input, prompt_line, read_password, App, Overrides};
use jobboard_cli::api::{AuthResponse, LoginForm, ProfileSource};
use jobboard_cli::auth::{Profile, Role, SessionStatus, SessionStore};

/// Arguments for the login command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard login                               Prompt for email and password\n    \
    jobboard login --email ada@example.com       Prompt for the password only\n    \
    echo secret | jobboard login -e ada@example.com --password-stdin")]
pub struct Args {
    /// Account email
    #[arg(short, long)]
    pub email: Option<String>,

    /// Account password (prompted for when omitted)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Read the password from the first line of stdin
    #[arg(long, conflicts_with = "password")]
    pub password_stdin: bool,
}

/// Executes the login command.
pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let app = App::load(overrides)?;

    // Check if already logged in
    let current = app.restore().await;
    if matches!(
        current.status(),
        SessionStatus::Authenticated | SessionStatus::Degraded
    ) {
        let who = current
            .profile
            .as_ref()
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|| "unknown account".to_string());
        let role = current.role.as_ref().map(Role::as_str).unwrap_or("unknown");
        println!("Already logged in as {} ({role})", who.cyan());
        println!("Run 'jobboard logout' first to log out.");
        return Ok(());
    }

    let email = match args.email {
        Some(email) => email,
        None => prompt_line("Email")?,
    };
    let password = read_password("Password", args.password, args.password_stdin)?;

    let form = LoginForm { email, password };
    check_input(form.validate())?;
    let response = app.api.login(&form).await.context("Login failed")?;
    let profile = complete_login(&app.store, app.api.as_ref(), response).await?;

    let session = app.store.session();
    let role = session.role.clone().unwrap_or(Role::Unknown(String::new()));
    println!();
    println!(
        "{} Logged in as {} ({})",
        "Success!".green().bold(),
        profile
            .as_ref()
            .map(Profile::display_name)
            .unwrap_or(form.email.as_str())
            .cyan(),
        role
    );
    println!("  {}  {}", "Home:".dimmed(), role.home_path());

    Ok(())
}

/// Stores the session from a login or registration response.
///
/// Fetches the profile when the response did not carry one; a failed
/// fetch leaves the session logged in without a profile.
pub async fn complete_login(
    store: &SessionStore,
    profiles: &dyn ProfileSource,
    response: AuthResponse,
) -> Result<Option<Profile>> {
    let role = response.resolved_role();
    let Some(token) = response.token else {
        bail!("Backend did not return a session token");
    };
    let Some(role) = role.filter(Role::is_known) else {
        bail!("Backend did not return a recognized account role");
    };

    let profile = match response.user {
        Some(profile) => Some(profile),
        None => match profiles.fetch_profile(&token, &role).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Could not fetch profile after login: {e}");
                None
            }
        },
    };

    let session = store
        .login(&token, role, profile)
        .context("Failed to store session")?;
    Ok(session.profile)
}
