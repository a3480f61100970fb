//! # Pin Command Implementation
//!
//! This module implements the `pin` subcommand, a local debugging aid: pin
//! a manifest file against a reference manifest on disk and show (or write
//! back) the minimal textual diff the repair batch would produce. No git or
//! network access is involved, which also makes this the natural surface
//! for end-to-end testing of the pin/rewrite pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use manifest_doctor::loader;
use manifest_doctor::manifest::Manifest;
use manifest_doctor::output::OutputConfig;
use manifest_doctor::pin::pin_manifest;
use manifest_doctor::rewrite::rewrite;

/// Pin a local manifest against a reference manifest on disk
#[derive(Args, Debug)]
pub struct PinArgs {
    /// The manifest file to pin (e.g. a project's local_manifest.xml).
    #[arg(long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// The reference manifest (includes are resolved).
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Write the result back instead of printing it.
    #[arg(long)]
    pub write: bool,

    /// Remove projects that are absent from the reference.
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `pin` command.
pub fn execute(args: PinArgs, output: &OutputConfig) -> Result<()> {
    let raw = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("failed to read {}", args.manifest.display()))?;
    let target = Manifest::parse(&raw, &args.manifest.display().to_string())?;
    let reference = loader::load_manifest_from_file_with_includes(&args.reference)?;

    let pinned = pin_manifest(&target, &reference);
    for missing in &pinned.missing_projects {
        eprintln!("warning: {} not in reference, revision untouched", missing);
    }

    let (new_text, changed) = rewrite(&raw, &pinned.pinned_manifest, args.strict)?;
    if !changed {
        println!("{}", output.good("no changes needed"));
        return Ok(());
    }

    if args.write {
        std::fs::write(&args.manifest, &new_text)
            .with_context(|| format!("failed to write {}", args.manifest.display()))?;
        println!("updated {}", args.manifest.display());
    } else {
        print!("{}", new_text);
    }
    Ok(())
}
