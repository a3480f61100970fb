//! # Pin Engine
//!
//! Pins every project entry of a target manifest to the revisions recorded
//! in a reference manifest. Projects present in the target but absent from
//! the reference never fail the call; they are collected so that callers can
//! decide whether to escalate.

use log::warn;

use crate::manifest::Manifest;

/// Outcome of pinning a target manifest against a reference.
#[derive(Debug, Clone)]
pub struct PinResult {
    /// The target manifest with revisions taken from the reference.
    pub pinned_manifest: Manifest,
    /// Paths of target projects with no counterpart in the reference.
    /// Their revisions are left untouched.
    pub missing_projects: Vec<String>,
}

/// Pin each project of `target` to the revision its path carries in
/// `reference`.
///
/// Lookup is by `path`, the unique project identifier. Projects missing from
/// the reference are reported in the result, never as an error. Pinning is
/// idempotent: pinning an already-pinned manifest is a no-op.
pub fn pin_manifest(target: &Manifest, reference: &Manifest) -> PinResult {
    let mut pinned = target.clone();
    let mut missing = Vec::new();
    for project in &mut pinned.projects {
        match reference.project_by_path(&project.path) {
            Some(reference_project) => {
                project.revision = reference_project.revision.clone();
            }
            None => {
                warn!(
                    "project {} ({}) not found in reference manifest, leaving revision untouched",
                    project.name, project.path
                );
                missing.push(project.path.clone());
            }
        }
    }
    PinResult {
        pinned_manifest: pinned,
        missing_projects: missing,
    }
}
