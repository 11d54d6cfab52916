//! Command-line interface for the job board client.
//!
//! Provides the CLI commands for logging in and out, checking page
//! access and working with the notification feed.

/// Shared setup for commands that talk to the backend.
pub mod app;

/// Individual CLI command implementations.
pub mod commands;

/// Output format selection.
pub mod format;
