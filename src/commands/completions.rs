//! # Completions Command Implementation
//!
//! Generates shell completion scripts for the CLI.

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::Shell;

/// Generate shell completions
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut command = crate::cli::Cli::command();
    clap_complete::generate(
        args.shell,
        &mut command,
        "manifest-doctor",
        &mut std::io::stdout(),
    );
    Ok(())
}
