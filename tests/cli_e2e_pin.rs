//! End-to-end tests for the `pin` command
//!
//! These tests invoke the actual CLI binary and validate its behavior
//! from a user's perspective.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

const REFERENCE: &str = r#"<manifest>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com"/>
  <default remote="cros-internal" revision="refs/heads/main"/>
  <project name="foo" path="src/foo" revision="refs/heads/release-R90-13816.B"/>
</manifest>
"#;

const UNPINNED: &str = r#"<manifest>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com"/>
  <project name="foo" path="src/foo" revision="refs/heads/main" remote="cros-internal"/>
</manifest>
"#;

fn doctor() -> Command {
    Command::cargo_bin("manifest-doctor").unwrap()
}

/// Test that --help flag shows help information
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_pin_help() {
    doctor()
        .arg("pin")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Pin a local manifest against a reference manifest",
        ));
}

/// Pinning an already-converged manifest reports no changes
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_pin_no_changes_needed() {
    let temp = assert_fs::TempDir::new().unwrap();
    let reference = temp.child("default.xml");
    reference.write_str(REFERENCE).unwrap();
    let manifest = temp.child("local_manifest.xml");
    manifest
        .write_str(&UNPINNED.replace("refs/heads/main", "refs/heads/release-R90-13816.B"))
        .unwrap();

    doctor()
        .arg("pin")
        .arg("--manifest")
        .arg(manifest.path())
        .arg("--reference")
        .arg(reference.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("no changes needed"));
}

/// Without --write the pinned manifest goes to stdout
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_pin_prints_pinned_manifest() {
    let temp = assert_fs::TempDir::new().unwrap();
    let reference = temp.child("default.xml");
    reference.write_str(REFERENCE).unwrap();
    let manifest = temp.child("local_manifest.xml");
    manifest.write_str(UNPINNED).unwrap();

    doctor()
        .arg("pin")
        .arg("--manifest")
        .arg(manifest.path())
        .arg("--reference")
        .arg(reference.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "revision=\"refs/heads/release-R90-13816.B\"",
        ));

    // The file itself is untouched without --write.
    manifest.assert(UNPINNED);
}

/// With --write the file is updated in place
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_pin_write_updates_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let reference = temp.child("default.xml");
    reference.write_str(REFERENCE).unwrap();
    let manifest = temp.child("local_manifest.xml");
    manifest.write_str(UNPINNED).unwrap();

    doctor()
        .arg("pin")
        .arg("--manifest")
        .arg(manifest.path())
        .arg("--reference")
        .arg(reference.path())
        .arg("--write")
        .assert()
        .success()
        .stdout(predicate::str::contains("updated"));

    manifest.assert(predicate::str::contains(
        "revision=\"refs/heads/release-R90-13816.B\"",
    ));
}

/// A missing manifest file is an error
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_pin_missing_manifest() {
    let temp = assert_fs::TempDir::new().unwrap();
    let reference = temp.child("default.xml");
    reference.write_str(REFERENCE).unwrap();

    doctor()
        .arg("pin")
        .arg("--manifest")
        .arg(temp.path().join("absent.xml"))
        .arg("--reference")
        .arg(reference.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
