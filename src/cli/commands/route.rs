//! Route command - run the route guard against the current session.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::cli::app::{App, Overrides};
use crate::cli::format::OutputFormat;
use jobboard_cli::guard::{Access, GuardDecision, RouteGuard};

/// Arguments for the route command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard route /company/dashboard     Check a company page\n    \
    jobboard route /jobs --format json    Machine-readable decision")]
pub struct Args {
    /// Page path, e.g. /admin/dashboard
    pub path: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let app = App::load(overrides)?;
    let access = Access::for_path(&args.path);

    // Public pages never need the session restored
    let decision = if access == Access::Public {
        GuardDecision::Render
    } else {
        let session = app.restore().await;
        RouteGuard::check(&session, &access)
    };

    match args.format {
        OutputFormat::Json => {
            let redirect = match &decision {
                GuardDecision::Redirect(path) => Some(path.as_str()),
                _ => None,
            };
            let out = json!({
                "path": args.path,
                "access": access.to_string(),
                "decision": match &decision {
                    GuardDecision::Loading => "loading",
                    GuardDecision::Redirect(_) => "redirect",
                    GuardDecision::Render => "render",
                },
                "redirect": redirect,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => match &decision {
            GuardDecision::Render => println!("{}", "render".green()),
            GuardDecision::Redirect(path) => println!("{} {}", "redirect".yellow(), path),
            GuardDecision::Loading => println!("{}", "loading".dimmed()),
        },
    }
    Ok(())
}
