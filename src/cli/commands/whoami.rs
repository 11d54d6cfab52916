//! Whoami command - show the restored session.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::app::{App, Overrides};
use crate::cli::format::OutputFormat;
use jobboard_cli::auth::{Session, SessionStatus};

/// Arguments for the whoami command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard whoami                Show the current session\n    \
    jobboard whoami --format json  Machine-readable session summary")]
pub struct Args {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct SessionSummary {
    status: String,
    role: Option<String>,
    user_id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    expires_at: Option<String>,
    home: String,
}

impl SessionSummary {
    fn from_session(session: &Session) -> Self {
        let profile = session.profile.as_ref();
        Self {
            status: session.status().to_string(),
            role: session.role.as_ref().map(|r| r.to_string()),
            user_id: session.user_id(),
            name: profile.and_then(|p| p.name.clone()),
            email: profile.and_then(|p| p.email.clone()),
            expires_at: session.expires_at().map(|t| t.to_rfc3339()),
            home: jobboard_cli::auth::role::home_for(session.role.as_ref()).to_string(),
        }
    }
}

/// Executes the whoami command.
pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let app = App::load(overrides)?;
    let session = app.restore().await;
    let summary = SessionSummary::from_session(&session);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_text(&session, &summary),
    }
    Ok(())
}

fn print_text(session: &Session, summary: &SessionSummary) {
    match session.status() {
        SessionStatus::Empty | SessionStatus::Loading => {
            println!("{}", "Not logged in.".yellow());
            return;
        }
        SessionStatus::Degraded => {
            println!(
                "{}",
                "Logged in, but the profile could not be loaded (backend unreachable?)".yellow()
            );
        }
        SessionStatus::Authenticated => {}
    }

    let unknown = || "-".to_string();
    println!(
        "  {}  {}",
        "Name:".dimmed(),
        summary.name.clone().unwrap_or_else(unknown).cyan()
    );
    println!(
        "  {}  {}",
        "Email:".dimmed(),
        summary.email.clone().unwrap_or_else(unknown)
    );
    println!(
        "  {}  {}",
        "Role:".dimmed(),
        summary.role.clone().unwrap_or_else(unknown)
    );
    println!(
        "  {}  {}",
        "User id:".dimmed(),
        summary.user_id.clone().unwrap_or_else(unknown)
    );
    println!(
        "  {}  {}",
        "Expires:".dimmed(),
        summary.expires_at.clone().unwrap_or_else(unknown)
    );
    println!("  {}  {}", "Home:".dimmed(), summary.home);
}
