//! Property tests for the rewriter fixed-point and pin idempotence laws.

use proptest::prelude::*;
use std::collections::BTreeMap;

use crate::manifest::{Defaults, Manifest, Project, Remote};
use crate::pin::pin_manifest;
use crate::rewrite::rewrite;

/// Build a manifest from `path -> (name, revision)` entries.
fn manifest_from(projects: &BTreeMap<String, (String, String)>) -> Manifest {
    Manifest {
        defaults: Defaults {
            remote_name: "cros".to_string(),
            revision: "refs/heads/main".to_string(),
            sync_j: String::new(),
        },
        remotes: vec![Remote {
            name: "cros".to_string(),
            fetch: "https://example.com".to_string(),
            ..Remote::default()
        }],
        projects: projects
            .iter()
            .map(|(path, (name, revision))| Project {
                name: name.clone(),
                path: path.clone(),
                revision: revision.clone(),
                ..Project::default()
            })
            .collect(),
        ..Manifest::default()
    }
}

proptest! {
    /// For any serialized manifest F, rewriting F against Parse(F) yields F
    /// unchanged.
    #[test]
    fn rewrite_fixed_point(
        projects in prop::collection::btree_map(
            "[a-z]{1,6}(/[a-z]{1,4})?",
            ("[a-z][a-z0-9]{0,8}", "[a-z0-9]{0,12}"),
            0..6,
        )
    ) {
        let manifest = manifest_from(&projects);
        let text = manifest.to_xml();
        let reparsed = Manifest::parse(&text, "prop").unwrap();
        let (output, changed) = rewrite(&text, &reparsed, false).unwrap();
        prop_assert_eq!(output, text);
        prop_assert!(!changed);
    }

    /// Pinning an already-pinned manifest changes nothing.
    #[test]
    fn pin_idempotence(
        target in prop::collection::btree_map(
            "[a-z]{1,6}",
            ("[a-z][a-z0-9]{0,8}", "[a-z0-9]{0,12}"),
            0..6,
        ),
        reference in prop::collection::btree_map(
            "[a-z]{1,6}",
            ("[a-z][a-z0-9]{0,8}", "[a-z0-9]{1,12}"),
            0..6,
        ),
    ) {
        let target = manifest_from(&target);
        let reference = manifest_from(&reference);
        let once = pin_manifest(&target, &reference);
        let twice = pin_manifest(&once.pinned_manifest, &reference);
        prop_assert_eq!(&once.pinned_manifest, &twice.pinned_manifest);
        prop_assert_eq!(&once.missing_projects, &twice.missing_projects);
    }

    /// Rewriting a serialized target against a pinned model produces a
    /// document whose matched projects carry the reference revisions.
    #[test]
    fn rewrite_applies_pinned_revisions(
        shared in prop::collection::btree_map(
            "[a-z]{1,6}",
            ("[a-z][a-z0-9]{0,8}", "[a-z0-9]{1,12}", "[a-z0-9]{1,12}"),
            1..5,
        )
    ) {
        let target = manifest_from(
            &shared
                .iter()
                .map(|(path, (name, old, _))| (path.clone(), (name.clone(), old.clone())))
                .collect(),
        );
        let reference = manifest_from(
            &shared
                .iter()
                .map(|(path, (name, _, new))| (path.clone(), (name.clone(), new.clone())))
                .collect(),
        );
        let text = target.to_xml();
        let pinned = pin_manifest(&target, &reference).pinned_manifest;
        let (output, _) = rewrite(&text, &pinned, false).unwrap();
        let reparsed = Manifest::parse(&output, "prop").unwrap();
        for (path, (_, _, new)) in &shared {
            prop_assert_eq!(&reparsed.project_by_path(path).unwrap().revision, new);
        }
    }
}
