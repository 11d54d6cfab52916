//! Register command - create an account.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde_json::{Map, Value};

use super::login::complete_login;
use crate::cli::app::{check_input, prompt_line, read_password, App, Overrides};
use jobboard_cli::api::RegistrationForm;
use jobboard_cli::auth::Role;

/// Account kinds that can be registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AccountKind {
    /// Job seeker
    User,
    /// Recruiting company
    Company,
    /// Platform administrator
    Admin,
}

impl From<AccountKind> for Role {
    fn from(kind: AccountKind) -> Self {
        match kind {
            AccountKind::User => Role::User,
            AccountKind::Company => Role::Company,
            AccountKind::Admin => Role::Admin,
        }
    }
}

/// Arguments for the register command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard register user --name Ada --email ada@example.com\n    \
    jobboard register company --name Acme --email hr@acme.test --field industry=Retail")]
pub struct Args {
    /// Kind of account to create
    #[arg(value_enum)]
    pub kind: AccountKind,

    /// Display name (person or company)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Account email
    #[arg(short, long)]
    pub email: Option<String>,

    /// Extra profile field as key=value (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    /// Account password (prompted for when omitted)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Read the password from the first line of stdin
    #[arg(long, conflicts_with = "password")]
    pub password_stdin: bool,
}

/// Executes the register command.
pub async fn run(args: Args, overrides: &Overrides) -> Result<()> {
    let extra = parse_fields(&args.fields)?;
    let app = App::load(overrides)?;
    let role = Role::from(args.kind);

    let name = match args.name {
        Some(name) => name,
        None => prompt_line("Name")?,
    };
    let email = match args.email {
        Some(email) => email,
        None => prompt_line("Email")?,
    };
    let password = read_password("Password", args.password, args.password_stdin)?;

    let form = RegistrationForm {
        name,
        email,
        password,
        extra,
    };
    check_input(form.validate())?;

    let response = app
        .api
        .register(&role, &form)
        .await
        .context("Registration failed")?;

    println!(
        "{} Registered {} account for {}",
        "Success!".green().bold(),
        role,
        form.email.cyan()
    );
    if let Some(message) = &response.message {
        println!("  {message}");
    }

    if response.token.is_some() {
        complete_login(&app.store, app.api.as_ref(), response).await?;
        println!("Logged in. Home: {}", role.home_path());
    } else {
        println!("Run 'jobboard login' to sign in.");
    }

    Ok(())
}

/// Parses repeated `key=value` arguments into extra form fields.
fn parse_fields(fields: &[String]) -> Result<Map<String, Value>> {
    let mut extra = Map::new();
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("Invalid field '{field}': expected KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid field '{field}': key is empty");
        }
        extra.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let fields = vec!["industry=Retail".to_string(), "size=10-50".to_string()];
        let extra = parse_fields(&fields).unwrap();
        assert_eq!(extra["industry"], "Retail");
        assert_eq!(extra["size"], "10-50");
    }

    #[test]
    fn test_parse_fields_rejects_malformed() {
        assert!(parse_fields(&["industry".to_string()]).is_err());
        assert!(parse_fields(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_account_kind_to_role() {
        assert_eq!(Role::from(AccountKind::Company), Role::Company);
        assert_eq!(Role::from(AccountKind::Admin).home_path(), "/admin/dashboard");
    }
}
