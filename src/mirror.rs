//! # Public Mirror Filter
//!
//! Derives the public equivalent of an internal buildspec by dropping
//! remotes that are not marked public and every project that references
//! them, then publishes the result to the public mirror bucket under the
//! source's relative path.
//!
//! A remote's public status comes from a `public` annotation on the
//! `<remote>` element of the internal buildspec. Buildspecs frozen before
//! the annotation existed carry none at all; for those, the current trunk
//! `default.xml` (loaded with includes) supplies the annotations instead.
//! This is a semantic inheritance, not a file-level include.

use std::collections::HashSet;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::storage::{GsPath, ObjectStore};

/// Tally of one mirror pass.
#[derive(Debug, Default)]
pub struct MirrorReport {
    /// Objects published to the public bucket.
    pub published: usize,
    /// Buildspecs skipped because their default remote is private.
    pub skipped_private: usize,
    /// Objects already present in the public bucket.
    pub skipped_existing: usize,
    /// Collected non-fatal errors.
    pub errors: Vec<Error>,
}

/// Names of remotes annotated `public="true"`.
fn public_remote_names(remotes: &Manifest) -> HashSet<String> {
    remotes
        .remotes
        .iter()
        .filter(|r| r.annotation("public") == Some("true"))
        .map(|r| r.name.clone())
        .collect()
}

/// Whether any remote carries a `public` annotation at all.
fn has_public_annotations(manifest: &Manifest) -> bool {
    manifest
        .remotes
        .iter()
        .any(|r| r.annotation("public").is_some())
}

/// Derive the public version of an internal buildspec.
///
/// `reference` supplies remote annotations when the buildspec itself has
/// none (the trunk `default.xml`, loaded with includes). The manifest's
/// default remote must be public; projects without an explicit remote
/// inherit it and are always retained.
pub fn public_manifest(internal: &Manifest, reference: Option<&Manifest>) -> Result<Manifest> {
    let public_names = if has_public_annotations(internal) {
        public_remote_names(internal)
    } else {
        let reference = reference.ok_or_else(|| Error::Config {
            message: "buildspec has no public annotations and no reference manifest was given"
                .to_string(),
            hint: None,
        })?;
        public_remote_names(reference)
    };

    let default_remote = &internal.defaults.remote_name;
    if !default_remote.is_empty() && !public_names.contains(default_remote) {
        return Err(Error::PrivateDefault {
            remote: default_remote.clone(),
        });
    }

    let mut public = internal.clone();
    public
        .remotes
        .retain(|remote| public_names.contains(&remote.name));
    public.projects.retain(|project| {
        project.remote_name.is_empty() || public_names.contains(&project.remote_name)
    });
    Ok(public)
}

/// Publish the public mirror of every internal buildspec under `prefix`
/// that is not yet present in the public bucket.
pub fn publish_public_mirrors(
    store: &dyn ObjectStore,
    internal_bucket: &str,
    public_bucket: &str,
    prefix: &str,
    reference: Option<&Manifest>,
    dry_run: bool,
) -> Result<MirrorReport> {
    let mut report = MirrorReport::default();
    let existing: HashSet<String> = store
        .list(public_bucket, prefix)?
        .into_iter()
        .collect();

    for object in store.list(internal_bucket, prefix)? {
        if existing.contains(&object) {
            report.skipped_existing += 1;
            continue;
        }
        let source = GsPath::new(internal_bucket, &object);
        let result = mirror_one(store, &source, public_bucket, reference, dry_run);
        match result {
            Ok(()) => report.published += 1,
            Err(Error::PrivateDefault { remote }) => {
                warn!(
                    "{}: default remote {} is private, not mirrored",
                    source, remote
                );
                report.skipped_private += 1;
            }
            Err(err) => {
                warn!("{}: {}", source, err);
                report.errors.push(err);
            }
        }
    }
    Ok(report)
}

fn mirror_one(
    store: &dyn ObjectStore,
    source: &GsPath,
    public_bucket: &str,
    reference: Option<&Manifest>,
    dry_run: bool,
) -> Result<()> {
    let bytes = store.read(source)?;
    let text = String::from_utf8_lossy(&bytes);
    let internal = Manifest::parse(&text, &source.to_string())?;
    let public = public_manifest(&internal, reference)?;

    let destination = GsPath::new(public_bucket, &source.object);
    if dry_run {
        info!("would have written {} (dry run)", destination);
        return Ok(());
    }
    store.write(&destination, public.to_xml().as_bytes())?;
    info!("mirrored {} to {}", source, destination);
    Ok(())
}
