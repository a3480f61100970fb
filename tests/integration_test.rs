//! Library-level integration tests exercising the load -> pin -> rewrite
//! pipeline against real files on disk, plus the public mirror pass.

use std::path::Path;

use manifest_doctor::loader;
use manifest_doctor::manifest::Manifest;
use manifest_doctor::mirror::publish_public_mirrors;
use manifest_doctor::pin::pin_manifest;
use manifest_doctor::rewrite::rewrite;
use manifest_doctor::storage::{GsPath, LocalStore, ObjectStore};
use tempfile::TempDir;

const REFERENCE_ROOT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <include name="_remotes.xml"/>
  <default remote="cros-internal" revision="refs/heads/main"/>
  <project name="chromeos/project/galaxy/milkyway"
           path="src/project/galaxy/milkyway"
           revision="refs/heads/release-R90-13816.B"/>
  <project name="chromeos/vendor/blobs"
           path="src/vendor/blobs"
           revision="8d35f2135c8f8d7deca0fbbbcbce11b4a1dcb805"/>
</manifest>
"#;

const REFERENCE_REMOTES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com">
    <annotation name="public" value="false"/>
  </remote>
  <remote name="cros" fetch="https://chromium.googlesource.com">
    <annotation name="public" value="true"/>
  </remote>
</manifest>
"#;

const LOCAL_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- Project-local additions; keep in sync with manifest-internal. -->
<manifest>
  <remote name="cros-internal"
          fetch="https://chrome-internal.googlesource.com"
          review="https://chrome-internal-review.googlesource.com" />
  <project name="chromeos/project/galaxy/milkyway"
           path="src/project/galaxy/milkyway"
           revision="refs/heads/main"
           remote="cros-internal" />
  <project name="chromeos/vendor/extra"
           path="src/vendor/extra"
           remote="cros-internal" />
</manifest>
"#;

fn write_reference_tree(dir: &Path) {
    std::fs::write(dir.join("default.xml"), REFERENCE_ROOT).unwrap();
    std::fs::write(dir.join("_remotes.xml"), REFERENCE_REMOTES).unwrap();
}

#[test]
fn pin_and_rewrite_pipeline_on_disk() {
    let temp = TempDir::new().unwrap();
    write_reference_tree(temp.path());
    let local_path = temp.path().join("local_manifest.xml");
    std::fs::write(&local_path, LOCAL_MANIFEST).unwrap();

    let reference =
        loader::load_manifest_from_file_with_includes(&temp.path().join("default.xml")).unwrap();
    assert_eq!(reference.remotes.len(), 2);

    let raw = std::fs::read_to_string(&local_path).unwrap();
    let target = Manifest::parse(&raw, "local_manifest.xml").unwrap();
    let pinned = pin_manifest(&target, &reference);
    // The extra vendor project is not in the reference.
    assert_eq!(pinned.missing_projects, vec!["src/vendor/extra".to_string()]);

    let (new_text, changed) = rewrite(&raw, &pinned.pinned_manifest, false).unwrap();
    assert!(changed);

    // Exactly one attribute value changed; comments and layout survive.
    let expected = LOCAL_MANIFEST.replace(
        "revision=\"refs/heads/main\"",
        "revision=\"refs/heads/release-R90-13816.B\"",
    );
    assert_eq!(new_text, expected);
    assert!(new_text.contains("<!-- Project-local additions; keep in sync with manifest-internal. -->"));

    // Writing back and repeating the pipeline converges: the second pass is
    // a byte-for-byte no-op.
    std::fs::write(&local_path, &new_text).unwrap();
    let raw2 = std::fs::read_to_string(&local_path).unwrap();
    let target2 = Manifest::parse(&raw2, "local_manifest.xml").unwrap();
    let pinned2 = pin_manifest(&target2, &reference);
    let (final_text, changed2) = rewrite(&raw2, &pinned2.pinned_manifest, false).unwrap();
    assert!(!changed2);
    assert_eq!(final_text, raw2);
}

#[test]
fn symlink_reference_resolves_before_includes() {
    let temp = TempDir::new().unwrap();
    write_reference_tree(temp.path());
    std::fs::rename(temp.path().join("default.xml"), temp.path().join("snapshot.xml")).unwrap();
    std::fs::write(temp.path().join("default.xml"), "snapshot.xml\n").unwrap();

    let reference =
        loader::load_manifest_from_file_with_includes(&temp.path().join("default.xml")).unwrap();
    assert_eq!(reference.remotes.len(), 2);
    assert_eq!(reference.projects.len(), 2);
}

#[test]
fn public_mirror_pass_over_storage() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path());

    let internal_buildspec = r#"<manifest>
  <remote name="cros" fetch="https://chromium.googlesource.com">
    <annotation name="public" value="true"/>
  </remote>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com">
    <annotation name="public" value="false"/>
  </remote>
  <default remote="cros" revision="refs/heads/main"/>
  <project name="bar" path="bar/" revision="rev-bar" remote="cros"/>
  <project name="foo" path="foo/" revision="rev-foo" remote="cros-internal"/>
  <project name="baz" path="baz/" revision="rev-baz"/>
</manifest>
"#;
    store
        .write(
            &GsPath::new("chromeos-galaxy", "buildspecs/93/13811.0.0.xml"),
            internal_buildspec.as_bytes(),
        )
        .unwrap();

    let report = publish_public_mirrors(
        &store,
        "chromeos-galaxy",
        "chromeos-galaxy-public",
        "buildspecs/",
        None,
        false,
    )
    .unwrap();
    assert_eq!(report.published, 1);

    let mirrored = store
        .read(&GsPath::new(
            "chromeos-galaxy-public",
            "buildspecs/93/13811.0.0.xml",
        ))
        .unwrap();
    let text = String::from_utf8(mirrored).unwrap();
    let public = Manifest::parse(&text, "public").unwrap();
    assert!(public.project_by_path("bar/").is_some());
    assert!(public.project_by_path("baz/").is_some());
    assert!(public.project_by_path("foo/").is_none());
    assert!(public.remote_by_name("cros-internal").is_none());
    assert!(!text.contains("cros-internal"));
    assert!(!text.contains("foo"));
}
