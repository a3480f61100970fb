//! # Mirror Command Implementation
//!
//! This module implements the `mirror` subcommand: for each internal
//! buildspec newly appearing under a watched prefix, derive the public
//! equivalent (dropping private remotes and the projects that reference
//! them) and publish it to the public mirror bucket.
//!
//! Buildspecs without `public` annotations on their remotes fall back to a
//! reference manifest (the trunk `default.xml`, loaded with includes) for
//! the annotations.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use manifest_doctor::loader;
use manifest_doctor::mirror::publish_public_mirrors;
use manifest_doctor::output::OutputConfig;
use manifest_doctor::storage::LocalStore;

/// Publish public mirrors of internal buildspecs
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Bucket holding the internal buildspecs.
    #[arg(long, value_name = "BUCKET")]
    pub internal_bucket: String,

    /// Bucket receiving the public mirrors.
    #[arg(long, value_name = "BUCKET")]
    pub public_bucket: String,

    /// Object prefix to watch.
    #[arg(long, value_name = "PREFIX", default_value = "buildspecs/")]
    pub prefix: String,

    /// Reference manifest supplying `public` annotations for buildspecs
    /// that carry none (typically the trunk default.xml).
    #[arg(long, value_name = "FILE")]
    pub reference: Option<PathBuf>,

    /// Publish for real instead of a dry run.
    #[arg(long)]
    pub push: bool,

    /// Root directory of the object-storage mirror.
    #[arg(long, value_name = "DIR", env = "MANIFEST_DOCTOR_STORAGE_ROOT")]
    pub storage_root: PathBuf,
}

/// Execute the `mirror` command.
pub fn execute(args: MirrorArgs, output: &OutputConfig) -> Result<()> {
    let store = LocalStore::new(&args.storage_root);
    let reference = match &args.reference {
        Some(path) => Some(loader::load_manifest_from_file_with_includes(path)?),
        None => None,
    };

    let report = publish_public_mirrors(
        &store,
        &args.internal_bucket,
        &args.public_bucket,
        &args.prefix,
        reference.as_ref(),
        !args.push,
    )?;

    println!(
        "{} mirrored, {} already public, {} private",
        report.published, report.skipped_existing, report.skipped_private
    );
    if !args.push {
        println!("dry run: nothing was uploaded");
    }
    if report.errors.is_empty() {
        println!("{}", output.good("mirror pass completed without errors"));
    } else {
        println!(
            "{}",
            output.bad(&format!("mirror pass had {} error(s)", report.errors.len()))
        );
        return Err(manifest_doctor::error::Error::Batch {
            errors: report.errors,
        }
        .into());
    }
    Ok(())
}
