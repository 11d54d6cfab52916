//! Push command - run a push relay or publish to one.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use crate::cli::app::Overrides;
use jobboard_cli::notifications::{
    run_relay, send_command, NotificationRecord, PushCommand, PushEvent, PushHub,
};

/// Arguments for the push command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard push serve                            Run the relay on push_addr\n    \
    jobboard push send u1 \"New applicant\"          Publish to user u1\n    \
    jobboard push ping                             Check the relay")]
pub struct Args {
    #[command(subcommand)]
    pub command: PushSubcommand,
}

#[derive(Subcommand)]
pub enum PushSubcommand {
    /// Run the relay in the foreground until Ctrl+C
    Serve,
    /// Publish a notification to a user's subscribers
    Send {
        /// Recipient user id
        user_id: String,
        /// Notification text
        message: String,
        /// Notification id (defaults to a timestamp-based id)
        #[arg(long)]
        id: Option<String>,
    },
    /// Check that the relay answers
    Ping,
}

pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let addr = overrides.config()?.push_addr;

    match args.command {
        PushSubcommand::Serve => serve(&addr).await,
        PushSubcommand::Send {
            user_id,
            message,
            id,
        } => {
            let id = id.unwrap_or_else(|| {
                format!("n-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
            });
            let command = PushCommand::Publish {
                user_id: user_id.clone(),
                notification: NotificationRecord::new(&id, &message),
            };
            match send_command(&addr, &command).await? {
                PushEvent::Published { delivered } => {
                    println!(
                        "Published {} to {} ({} subscriber(s))",
                        id.cyan(),
                        user_id,
                        delivered
                    );
                    Ok(())
                }
                PushEvent::Error { message } => bail!("Relay error: {message}"),
                other => bail!("Unexpected relay response: {other:?}"),
            }
        }
        PushSubcommand::Ping => match send_command(&addr, &PushCommand::Ping).await? {
            PushEvent::Pong => {
                println!("{} relay at {} is up", "✓".green(), addr);
                Ok(())
            }
            other => bail!("Unexpected relay response: {other:?}"),
        },
    }
}

/// Runs the relay until Ctrl+C.
async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind push relay to {addr}"))?;
    let hub = Arc::new(PushHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let relay = tokio::spawn(run_relay(listener, hub, shutdown_rx));
    println!("Push relay listening on {}. Press Ctrl+C to stop.", addr.cyan());

    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Received Ctrl+C, shutting down...");

    let _ = shutdown_tx.send(());
    match relay.await {
        Ok(result) => result,
        Err(e) => bail!("Push relay task failed: {e}"),
    }
}
