//! Integration tests for the jobboard binary
//!
//! Each test runs the binary against its own temporary data directory,
//! with the credential store forced to the session file so the OS
//! keychain is never touched.

use assert_cmd::Command;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

// =============================================================================
// Test Helpers
// =============================================================================

/// An address nothing listens on, so backend calls fail fast.
const UNREACHABLE_API: &str = "http://127.0.0.1:9";

/// Creates a data directory with a file-backed credential store.
fn data_dir() -> TempDir {
    let dir = tempdir().expect("Failed to create temp directory");
    fs::write(
        dir.path().join("config.yaml"),
        format!(
            "api_url: {UNREACHABLE_API}\nrequest_timeout_secs: 5\ncredential_store: file\n"
        ),
    )
    .expect("Failed to write config");
    dir
}

fn jobboard(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("jobboard").expect("binary should build");
    cmd.env("JOBBOARD_HOME", dir).env_remove("RUST_LOG");
    cmd
}

fn token_expiring_in(offset: Duration) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::json!({ "id": "u1", "exp": (Utc::now() + offset).timestamp() });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.sig")
}

fn write_session(dir: &Path, token: &str, role: &str) {
    let json = serde_json::json!({ "token": token, "role": role });
    fs::write(dir.join("session.json"), json.to_string()).expect("Failed to write session");
}

// =============================================================================
// General
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = data_dir();
    jobboard(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("notifications"))
        .stdout(predicate::str::contains("route"));
}

#[test]
fn test_completions_bash() {
    let dir = data_dir();
    jobboard(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jobboard"));
}

// =============================================================================
// Config Command Tests
// =============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["config", "set", "push_addr", "127.0.0.1:7100"])
            .assert()
            .success();

        jobboard(dir.path())
            .args(["config", "get", "push_addr"])
            .assert()
            .success()
            .stdout(predicate::str::contains("127.0.0.1:7100"));

        // Unrelated keys survive the rewrite
        jobboard(dir.path())
            .args(["config", "get", "credential_store"])
            .assert()
            .success()
            .stdout(predicate::str::contains("file"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["config", "set", "theme", "dark"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["config", "set", "credential_store", "vault"])
            .assert()
            .failure();
    }

    #[test]
    fn test_show_lists_keys() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("api_url"))
            .stdout(predicate::str::contains(UNREACHABLE_API));
    }
}

// =============================================================================
// Route Command Tests
// =============================================================================

mod route_tests {
    use super::*;

    #[test]
    fn test_public_page_renders() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["route", "/login"])
            .assert()
            .success()
            .stdout(predicate::str::contains("render"));
    }

    #[test]
    fn test_protected_page_without_session_redirects_to_login() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["route", "/admin/dashboard", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"redirect\": \"/login\""));
    }

    #[test]
    fn test_expired_session_is_cleared() {
        let dir = data_dir();
        write_session(dir.path(), &token_expiring_in(-Duration::hours(1)), "company");

        jobboard(dir.path())
            .args(["route", "/company/dashboard"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/login"));

        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_offline_backend_keeps_session() {
        let dir = data_dir();
        write_session(dir.path(), &token_expiring_in(Duration::hours(1)), "user");

        jobboard(dir.path())
            .args(["route", "/user/dashboard"])
            .assert()
            .success()
            .stdout(predicate::str::contains("render"));

        jobboard(dir.path())
            .args(["route", "/admin/dashboard"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/user/dashboard"));

        assert!(dir.path().join("session.json").exists());
    }
}

// =============================================================================
// Session Command Tests
// =============================================================================

mod session_tests {
    use super::*;

    #[test]
    fn test_logout_when_not_logged_in() {
        let dir = data_dir();
        jobboard(dir.path())
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not currently logged in"));
    }

    #[test]
    fn test_logout_removes_session_file() {
        let dir = data_dir();
        write_session(dir.path(), &token_expiring_in(Duration::hours(1)), "user");

        jobboard(dir.path())
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("Logged out"));

        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_whoami_reports_degraded_session() {
        let dir = data_dir();
        write_session(dir.path(), &token_expiring_in(Duration::hours(1)), "user");

        jobboard(dir.path())
            .args(["whoami", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": \"degraded\""))
            .stdout(predicate::str::contains("\"user_id\": \"u1\""));
    }

    #[test]
    fn test_whoami_logged_out() {
        let dir = data_dir();
        jobboard(dir.path())
            .arg("whoami")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not logged in"));
    }

    #[test]
    fn test_login_rejects_invalid_email_locally() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["login", "--email", "not-an-email", "--password", "secret1"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("not a valid email"));
    }

    #[test]
    fn test_register_rejects_short_password_locally() {
        let dir = data_dir();
        jobboard(dir.path())
            .args([
                "register",
                "company",
                "--name",
                "Acme",
                "--email",
                "hr@acme.test",
                "--password",
                "abc",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("at least 6 characters"));
    }

    #[test]
    fn test_notifications_require_login() {
        let dir = data_dir();
        jobboard(dir.path())
            .args(["notifications", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not logged in"));
    }
}
