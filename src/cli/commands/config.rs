//! Config command - manage configuration

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use jobboard_cli::config::{Config, CONFIG_KEYS};

#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard config                                  Show all settings\n    \
    jobboard config get api_url                      Print one setting\n    \
    jobboard config set api_url https://jobs.test    Change the backend\n    \
    jobboard config set credential_store file        Skip the OS keychain")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        Some(ConfigCommand::Show) | None => show_config(),
        Some(ConfigCommand::Get { key }) => get_config(&key),
        Some(ConfigCommand::Set { key, value }) => set_config(&key, &value),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Job Board Configuration".bold());
    println!();
    println!(
        "  {}  {}",
        "Config file:".dimmed(),
        Config::config_path()?.display()
    );
    println!();

    for key in CONFIG_KEYS {
        println!("  {:<22} {}", format!("{key}:").dimmed(), config.get(key)?);
    }

    Ok(())
}

fn get_config(key: &str) -> Result<()> {
    let config = Config::load()?;
    println!("{}", config.get(key)?);
    Ok(())
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.set(key, value)?;
    config.save()?;
    println!("Set {} = {}", key.cyan(), config.get(key)?);
    Ok(())
}
