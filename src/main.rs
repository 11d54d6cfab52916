use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::app::Overrides;
use cli::commands;

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "jobboard")]
#[command(version)]
#[command(about = "Job board client - sessions, access checks and live notifications")]
#[command(long_about = "Logs in to the job board backend, keeps the session in the OS\n\
    keychain, checks which pages the session may open, and follows the\n\
    logged-in user's notifications as they arrive.")]
#[command(after_help = "EXAMPLES:\n    \
    jobboard login --email ada@example.com   Log in\n    \
    jobboard whoami                          Show the current session\n    \
    jobboard route /admin/dashboard          Check access to a page\n    \
    jobboard notifications list              List notifications\n    \
    jobboard notifications watch             Follow new notifications\n    \
    jobboard push serve                      Run a local push relay\n\n\
    For more information about a command, run 'jobboard <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: Overrides,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    #[command(long_about = "Exchanges email and password for a session token, fetches the\n\
        account profile and stores token and role in the OS keychain\n\
        (or ~/.jobboard/session.json when no keychain is available).")]
    Login(commands::login::Args),

    /// Clear the stored session
    Logout(commands::logout::Args),

    /// Create a user, company or admin account
    #[command(long_about = "Registers a new account for the given role. When the backend\n\
        returns a token the new account is logged in immediately.")]
    Register(commands::register::Args),

    /// Show the current session and profile
    #[command(long_about = "Restores the stored session, validating the token expiry and\n\
        fetching the profile for the stored role, then prints the result.")]
    Whoami(commands::whoami::Args),

    /// Request or complete a password reset
    Password(commands::password::Args),

    /// Check whether the current session may open a page
    #[command(long_about = "Restores the session and runs the route guard for a path. Prints\n\
        'render' when the page may be shown, or the redirect target.")]
    Route(commands::route::Args),

    /// List, acknowledge and follow notifications
    #[command(long_about = "Works with the logged-in user's notifications. Changes are sent\n\
        to the backend first and only applied locally once accepted.\n\
        'watch' keeps a push subscription open and prints new notifications\n\
        as they arrive.")]
    Notifications(commands::notifications::Args),

    /// Run or talk to a push relay
    #[command(long_about = "Runs a line-delimited JSON push relay that delivers notifications\n\
        to subscribers by user id, or publishes a notification to one.")]
    Push(commands::push::Args),

    /// View and manage configuration settings
    #[command(long_about = "Provides subcommands to show, get, and set configuration values.\n\
        Configuration is stored in ~/.jobboard/config.yaml.")]
    Config(commands::config::Args),

    /// Generate shell completion scripts
    Completions(commands::completions::Args),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "jobboard_cli=debug,jobboard=debug"
    } else {
        "jobboard_cli=info,jobboard=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let overrides = &cli.overrides;
    match cli.command {
        Commands::Login(args) => commands::login::run(args, overrides).await,
        Commands::Logout(args) => commands::logout::run(args, overrides),
        Commands::Register(args) => commands::register::run(args, overrides).await,
        Commands::Whoami(args) => commands::whoami::run(args, overrides).await,
        Commands::Password(args) => commands::password::run(args, overrides).await,
        Commands::Route(args) => commands::route::run(args, overrides).await,
        Commands::Notifications(args) => commands::notifications::run(args, overrides).await,
        Commands::Push(args) => commands::push::run(args, overrides).await,
        Commands::Config(args) => commands::config::run(args),
        Commands::Completions(args) => {
            commands::completions::generate_completions(&mut Cli::command(), args.shell);
            Ok(())
        }
    }
}
