//! CLI commands for the job board client.
//!
//! Each submodule implements a single CLI command with its argument
//! parsing and execution logic.

/// Shell completion scripts.
pub mod completions;

/// Configuration viewing and management.
pub mod config;

/// Log in with email and password.
pub mod login;

/// Clear the stored session.
pub mod logout;

/// List, acknowledge and follow notifications.
pub mod notifications;

/// Password reset requests.
pub mod password;

/// Push relay server and publisher.
pub mod push;

/// Account registration.
pub mod register;

/// Route guard check for a page path.
pub mod route;

/// Show the current session.
pub mod whoami;
