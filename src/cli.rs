//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use manifest_doctor::output::OutputConfig;

use crate::commands;

/// Manifest Doctor - keep per-branch manifest pins in lock-step
#[derive(Parser, Debug)]
#[command(name = "manifest-doctor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Repair local_manifest.xml on active release branches
    Branch(commands::branch::BranchArgs),

    /// Produce and publish per-project buildspecs
    Buildspec(commands::buildspec::BuildspecArgs),

    /// Publish public mirrors of internal buildspecs
    Mirror(commands::mirror::MirrorArgs),

    /// Pin a local manifest against a reference manifest on disk
    Pin(commands::pin::PinArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .init();
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Branch(args) => commands::branch::execute(args, &output),
            Commands::Buildspec(args) => commands::buildspec::execute(args, &output),
            Commands::Mirror(args) => commands::mirror::execute(args, &output),
            Commands::Pin(args) => commands::pin::execute(args, &output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
