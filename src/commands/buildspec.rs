//! # Buildspec Command Implementation
//!
//! This module implements the `buildspec` subcommand: produce per-project
//! buildspecs from a version-stamped input manifest and publish them to the
//! per-target storage buckets.
//!
//! The gitiles and object-storage transports are deployment concerns; this
//! command addresses both through local directory roots (`--gitiles-root`,
//! `--storage-root`), which is also how the end-to-end tests drive it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use manifest_doctor::buildspec::{BuildspecBuilder, BuildspecOptions};
use manifest_doctor::loader::DirGitiles;
use manifest_doctor::output::OutputConfig;
use manifest_doctor::storage::LocalStore;

/// Produce and publish per-project buildspecs
#[derive(Args, Debug)]
pub struct BuildspecArgs {
    /// An explicit buildspec path, e.g. full/buildspecs/93/13811.0.0.xml.
    #[arg(long, value_name = "PATH", conflicts_with = "watch_paths")]
    pub buildspec: Option<String>,

    /// Comma-separated prefixes to scan for new buildspecs.
    #[arg(long, value_delimiter = ',', value_name = "PREFIXES")]
    pub watch_paths: Vec<String>,

    /// Minimum milestone directory to consider under watch paths.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub min_milestone: u32,

    /// Comma-separated program/project targets; project may be `*`.
    #[arg(long, value_delimiter = ',', value_name = "TARGETS")]
    pub projects: Vec<String>,

    /// Overwrite destination objects that already exist.
    #[arg(long)]
    pub force: bool,

    /// Publish for real instead of a dry run.
    #[arg(long)]
    pub push: bool,

    /// Time-to-live, in days, attached to written objects.
    #[arg(long, value_name = "DAYS")]
    pub ttl: Option<u32>,

    /// Root directory of the gitiles mirror.
    #[arg(long, value_name = "DIR", env = "MANIFEST_DOCTOR_GITILES_ROOT")]
    pub gitiles_root: PathBuf,

    /// Root directory of the object-storage mirror.
    #[arg(long, value_name = "DIR", env = "MANIFEST_DOCTOR_STORAGE_ROOT")]
    pub storage_root: PathBuf,
}

/// Execute the `buildspec` command.
pub fn execute(args: BuildspecArgs, output: &OutputConfig) -> Result<()> {
    let gitiles = DirGitiles::new(&args.gitiles_root);
    let store = LocalStore::new(&args.storage_root);
    let builder = BuildspecBuilder::new(&gitiles, &store);

    let options = BuildspecOptions {
        buildspec: args.buildspec.clone(),
        watch_paths: args.watch_paths.clone(),
        min_milestone: args.min_milestone,
        targets: args.projects.clone(),
        force: args.force,
        dry_run: !args.push,
        ttl_days: args.ttl,
    };

    let spinner = output.spinner("building buildspecs");
    let report = builder.build_all(&options)?;
    spinner.finish_and_clear();

    println!(
        "{} written, {} already present, {} without local manifest",
        report.written, report.skipped_existing, report.skipped_missing
    );
    if !args.push {
        println!("dry run: nothing was uploaded");
    }
    if report.errors.is_empty() {
        println!("{}", output.good("build completed without errors"));
    } else {
        println!(
            "{}",
            output.bad(&format!("build had {} error(s)", report.errors.len()))
        );
    }
    report.into_result()?;
    Ok(())
}
