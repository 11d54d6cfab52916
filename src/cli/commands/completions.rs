//! Completions command - print a shell completion script for `jobboard`.

use clap::Command;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

/// Binary name the scripts complete.
const BIN_NAME: &str = "jobboard";

/// Arguments for the completions command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    jobboard completions bash > ~/.local/share/bash-completion/completions/jobboard\n    \
    jobboard completions zsh > ~/.zfunc/_jobboard\n    \
    jobboard completions fish > ~/.config/fish/completions/jobboard.fish\n    \
    jobboard completions powershell >> $PROFILE")]
pub struct Args {
    /// Target shell (bash, zsh, fish, powershell or elvish)
    #[arg(value_name = "SHELL", value_enum)]
    pub shell: Shell,
}

/// Prints the script for `shell` built from the full command tree.
pub fn generate_completions(cmd: &mut Command, shell: Shell) {
    write_completions(cmd, shell, &mut io::stdout());
}

fn write_completions(cmd: &mut Command, shell: Shell, out: &mut dyn Write) {
    generate(shell, cmd, BIN_NAME, out);
}
