//! Notifications command - list, acknowledge and follow notifications.
//!
//! Every subcommand runs the notification center against the restored
//! session. One-shot subcommands use an in-process push hub since they
//! exit before anything could be pushed; `watch` connects to the push
//! relay and prints records as they arrive.

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Subcommand;
use colored::Colorize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::cli::app::{App, Overrides};
use crate::cli::format::OutputFormat;
use jobboard_cli::auth::{AuthError, SessionStatus};
use jobboard_cli::notifications::{
    FeedError, FeedSnapshot, NotificationCenter, NotificationRecord, PushChannel, PushHub,
    TcpPushChannel,
};

/// How often `watch` re-checks the token expiry.
const EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Extra slack on top of the request timeout while waiting for the first list.
const ACTIVATION_SLACK: Duration = Duration::from_secs(5);

/// Arguments for the notifications command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard notifications                 List notifications\n    \
    jobboard notifications read <ID>       Mark one as read\n    \
    jobboard notifications read-all        Mark all as read\n    \
    jobboard notifications watch           Follow new notifications")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<NotificationsCommand>,
}

#[derive(Subcommand)]
pub enum NotificationsCommand {
    /// List notifications, newest first
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Mark a notification as read
    Read { id: String },
    /// Mark every notification as read
    ReadAll,
    /// Delete a notification
    Delete { id: String },
    /// Delete all notifications
    Clear,
    /// Print notifications as they are pushed until interrupted
    Watch,
}

pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let command = args.command.unwrap_or(NotificationsCommand::List {
        format: OutputFormat::Text,
    });

    let app = App::load(overrides)?;
    let session = app.restore().await;
    match session.status() {
        SessionStatus::Empty | SessionStatus::Loading => bail!(AuthError::NotLoggedIn),
        SessionStatus::Degraded | SessionStatus::Authenticated => {}
    }
    if session.user_id().is_none() {
        bail!("The session carries no user id; run 'jobboard login' again");
    }

    let push: Arc<dyn PushChannel> = match &command {
        NotificationsCommand::Watch => Arc::new(TcpPushChannel::new(&app.config.push_addr)),
        _ => Arc::new(PushHub::new()),
    };
    let center = NotificationCenter::spawn(app.store.subscribe(), app.api.clone(), push);
    let mut feed = center.subscribe();

    let timeout = Duration::from_secs(app.config.request_timeout_secs) + ACTIVATION_SLACK;
    let snapshot = wait_for_activation(&mut feed, timeout).await?;
    if snapshot.auth_rejected {
        center.shutdown().await;
        return rejected(&app);
    }

    let result = match command {
        NotificationsCommand::List { format } => {
            print_list(&snapshot, format)?;
            Ok(())
        }
        NotificationsCommand::Read { id } => center.mark_as_read(&id).await.map(|()| {
            println!("Marked {} as read", id.cyan());
        }),
        NotificationsCommand::ReadAll => center.mark_all_as_read().await.map(|()| {
            println!("Marked {} notification(s) as read", snapshot.unread);
        }),
        NotificationsCommand::Delete { id } => center.delete(&id).await.map(|()| {
            println!("Deleted {}", id.cyan());
        }),
        NotificationsCommand::Clear => center.clear_all().await.map(|()| {
            println!("Deleted {} notification(s)", snapshot.records.len());
        }),
        NotificationsCommand::Watch => {
            let outcome = watch_feed(&app, &mut feed, snapshot).await;
            center.shutdown().await;
            return outcome;
        }
    };
    center.shutdown().await;

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_authorization() => rejected(&app),
        Err(e) => Err(e).context("Notification update failed"),
    }
}

/// Waits until the center has fetched the list or been rejected.
async fn wait_for_activation(
    feed: &mut watch::Receiver<FeedSnapshot>,
    timeout: Duration,
) -> Result<FeedSnapshot> {
    let snapshot = tokio::time::timeout(timeout, feed.wait_for(|s| s.is_active() || s.auth_rejected))
        .await
        .context("Timed out loading notifications")?
        .map_err(|_| FeedError::Closed)?
        .clone();
    Ok(snapshot)
}

/// Clears the session after the backend rejected its token.
fn rejected(app: &App) -> Result<()> {
    app.store.logout().context("Failed to clear stored session")?;
    bail!("The server rejected the session; you have been logged out. Run 'jobboard login'.")
}

fn print_list(snapshot: &FeedSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "unread": snapshot.unread,
                "notifications": snapshot.records,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if snapshot.records.is_empty() {
                println!("{}", "No notifications.".dimmed());
                return Ok(());
            }
            println!(
                "{} ({} unread)",
                "Notifications".bold(),
                snapshot.unread.to_string().cyan()
            );
            println!();
            for record in &snapshot.records {
                print_record(record);
            }
        }
    }
    Ok(())
}

fn print_record(record: &NotificationRecord) {
    let marker = if record.is_read {
        "○".dimmed()
    } else {
        "●".green()
    };
    let when = record
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M");
    println!(
        "  {} {}  {}  {}",
        marker,
        when.to_string().dimmed(),
        record.id.dimmed(),
        record.message
    );
}

/// Follows the feed until interrupted, the session ends or the token expires.
async fn watch_feed(
    app: &App,
    feed: &mut watch::Receiver<FeedSnapshot>,
    initial: FeedSnapshot,
) -> Result<()> {
    let mut seen: HashSet<String> = initial.records.iter().map(|r| r.id.clone()).collect();
    println!(
        "Watching notifications ({} unread). Press Ctrl+C to stop.",
        initial.unread.to_string().cyan()
    );

    let mut expiry = tokio::time::interval(EXPIRY_CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            _ = expiry.tick() => {
                if app.store.check_expiry(Utc::now())? {
                    println!("{}", "Session expired; you have been logged out.".yellow());
                    break;
                }
            }
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.borrow_and_update().clone();
                if snapshot.auth_rejected {
                    return rejected(app);
                }
                if !snapshot.is_active() {
                    println!("{}", "Session ended.".yellow());
                    break;
                }
                // Records are newest first; print arrivals oldest first
                for record in snapshot.records.iter().rev() {
                    if seen.insert(record.id.clone()) {
                        print_record(record);
                    }
                }
            }
        }
    }
    Ok(())
}
