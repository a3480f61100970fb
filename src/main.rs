//! # Manifest Doctor CLI
//!
//! This is the binary entry point for the `manifest-doctor` command-line
//! tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Translating top-level errors into user-friendly output and the
//!   documented process exit codes (1 configuration, 2 auth/setup,
//!   3 memoization client, 4 batch errors, 5 reference-manifest load).
//!
//! The core application logic lives in the library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    if let Err(err) = cli.execute() {
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<manifest_doctor::error::Error>()
            .map_or(1, |e| e.exit_code());
        std::process::exit(code);
    }
}
