//! # Branch Command Implementation
//!
//! This module implements the `branch` subcommand, the local manifest
//! branching batch: for every active release branch, pin each configured
//! project's `local_manifest.xml` to the canonical manifest's revisions,
//! commit the minimal textual diff, and push for direct submission.
//!
//! Configuration comes from a YAML file (see the `config` module) with
//! every field overridable on the command line. Without `--push` the batch
//! is a dry run: pushes carry `--dry-run` and memoization is untouched.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use manifest_doctor::config::{self, DoctorConfig};
use manifest_doctor::error::Error;
use manifest_doctor::git::SystemGit;
use manifest_doctor::memo::JsonFileStore;
use manifest_doctor::output::OutputConfig;
use manifest_doctor::pool::CancelToken;
use manifest_doctor::repair::Repairer;

/// Repair local_manifest.xml on active release branches
#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Path to the YAML run configuration.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the full checkout (overrides the config file).
    ///
    /// Can also be set with the `MANIFEST_DOCTOR_CHECKOUT` environment
    /// variable.
    #[arg(long, value_name = "DIR", env = "MANIFEST_DOCTOR_CHECKOUT")]
    pub checkout: Option<PathBuf>,

    /// Comma-separated list of project paths to consider.
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    pub projects: Vec<String>,

    /// Minimum milestone of branches to consider.
    #[arg(long, value_name = "N")]
    pub min_milestone: Option<u32>,

    /// Milestone currently on trunk; enables processing `main`.
    #[arg(long, value_name = "N")]
    pub trunk_milestone: Option<u32>,

    /// Comma-separated explicit branch list; skips branch derivation.
    #[arg(long, value_delimiter = ',', value_name = "BRANCHES")]
    pub branches: Vec<String>,

    /// Git remote used to probe and fetch project branches.
    #[arg(long, value_name = "REMOTE")]
    pub remote: Option<String>,

    /// Worker pool size for projects within a branch.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Root directory of the memoization store.
    #[arg(long, value_name = "DIR")]
    pub memo_root: Option<PathBuf>,

    /// Overall batch deadline in minutes (0 disables it).
    #[arg(long, value_name = "MINUTES")]
    pub deadline_minutes: Option<u64>,

    /// Push changes to the remote for real.
    #[arg(long)]
    pub push: bool,
}

impl BranchArgs {
    /// Fold the config file and the CLI overrides into one configuration.
    fn resolve(&self) -> Result<DoctorConfig, Error> {
        let mut resolved = match &self.config {
            Some(path) => config::from_file(path)?,
            None => DoctorConfig::default(),
        };
        if let Some(checkout) = &self.checkout {
            resolved.checkout = checkout.clone();
        }
        if !self.projects.is_empty() {
            resolved.projects = self.projects.clone();
        }
        if let Some(min_milestone) = self.min_milestone {
            resolved.min_milestone = min_milestone;
        }
        if self.trunk_milestone.is_some() {
            resolved.trunk_milestone = self.trunk_milestone;
        }
        if !self.branches.is_empty() {
            resolved.branches = Some(self.branches.clone());
        }
        if let Some(remote) = &self.remote {
            resolved.remote = remote.clone();
        }
        if let Some(concurrency) = self.concurrency {
            resolved.concurrency = concurrency;
        }
        if self.memo_root.is_some() {
            resolved.memo_root = self.memo_root.clone();
        }
        if let Some(deadline_minutes) = self.deadline_minutes {
            resolved.deadline_minutes = deadline_minutes;
        }
        if self.push {
            resolved.push = true;
        }
        resolved.validate()?;
        Ok(resolved)
    }
}

/// Execute the `branch` command.
pub fn execute(args: BranchArgs, output: &OutputConfig) -> Result<()> {
    let resolved = args.resolve()?;
    let memo = JsonFileStore::new(resolved.memo_root());
    let git = SystemGit;
    let repairer = Repairer::new(&git, &memo, resolved.repair_options());

    let spinner = output.spinner("repairing local manifests");
    let report = repairer.run(&CancelToken::new())?;
    spinner.finish_and_clear();

    println!(
        "{} committed, {} up to date, {} skipped, {} memoized",
        report.committed, report.noop, report.skipped, report.memoized
    );
    if !resolved.push {
        println!("dry run: no changes were pushed, memoization untouched");
    }
    if report.errors.is_empty() {
        println!("{}", output.good("batch completed without errors"));
    } else {
        println!(
            "{}",
            output.bad(&format!("batch had {} error(s)", report.errors.len()))
        );
    }
    report.into_result()?;
    Ok(())
}
