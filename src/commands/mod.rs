//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `manifest-doctor` command-line tool. Each subcommand is defined in its
//! own file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and
//!   options, derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `manifest_doctor` library.

pub mod branch;
pub mod buildspec;
pub mod completions;
pub mod mirror;
pub mod pin;
