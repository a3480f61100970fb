//! # Per-Project Buildspec Builder
//!
//! Given a version-stamped buildspec in the central manifest-versions
//! repository, produces program- and project-specific buildspecs and
//! publishes them to the corresponding per-project storage buckets:
//!
//! - `gs://chromeos-<program>/buildspecs/<path>` from the program repo's
//!   `local_manifest.xml`,
//! - `gs://chromeos-<program>-<project>/buildspecs/<path>` from the project
//!   repo's.
//!
//! Buildspec paths look like `{full/,}buildspecs/<milestone>/<build>.0.0
//! [-rcN].xml`. The release branch a buildspec froze is resolved from the
//! milestone directory; milestones newer than every release branch are
//! still on trunk and read `main`. Program-level repositories may lack a
//! `local_manifest.xml` entirely (logged, skipped); for project-level
//! repositories that is an error.

use std::time::Duration;

use glob::Pattern;
use log::{info, warn};

use crate::branches::{branch_for_milestone, release_branches, ReleaseBranch};
use crate::error::{Error, Result};
use crate::git::normalize_ref;
use crate::loader::Gitiles;
use crate::manifest::Manifest;
use crate::pin::pin_manifest;
use crate::storage::{GsPath, ObjectStore, ScratchDir};
use crate::version::BuildspecPath;

/// Host serving the internal manifest repositories.
pub const INTERNAL_HOST: &str = "chrome-internal.googlesource.com";

/// Host serving the external mirrors.
pub const EXTERNAL_HOST: &str = "chromium.googlesource.com";

/// The internal manifest-versions repository.
pub const MANIFEST_VERSIONS_PROJECT: &str = "chromeos/manifest-versions";

/// The manifest-internal repository, used to enumerate release branches.
pub const MANIFEST_INTERNAL_PROJECT: &str = "chromeos/manifest-internal";

const LOCAL_MANIFEST: &str = "local_manifest.xml";

/// A `(program, project)` publication target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub program: String,
    pub project: String,
}

impl Target {
    fn program_repo(&self) -> String {
        format!("chromeos/program/{}", self.program)
    }

    fn project_repo(&self) -> String {
        format!("chromeos/project/{}/{}", self.program, self.project)
    }

    fn program_bucket(&self) -> String {
        format!("chromeos-{}", self.program)
    }

    fn project_bucket(&self) -> String {
        format!("chromeos-{}-{}", self.program, self.project)
    }
}

/// Options for one buildspec build.
#[derive(Debug, Clone, Default)]
pub struct BuildspecOptions {
    /// An explicit buildspec path; mutually exclusive with `watch_paths`.
    pub buildspec: Option<String>,
    /// Prefixes (e.g. `full/buildspecs/`) to scan for new buildspecs.
    pub watch_paths: Vec<String>,
    /// Minimum milestone directory to consider under watch paths.
    pub min_milestone: u32,
    /// `program/project` pairs; `project` may be a `*` wildcard.
    pub targets: Vec<String>,
    /// Overwrite destination objects that already exist.
    pub force: bool,
    /// Log instead of writing to storage.
    pub dry_run: bool,
    /// Optional time-to-live, in days, attached to written objects.
    pub ttl_days: Option<u32>,
}

impl BuildspecOptions {
    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::Config {
                message: "at least one program/project target is required".to_string(),
                hint: None,
            });
        }
        match (&self.buildspec, self.watch_paths.is_empty()) {
            (None, true) => Err(Error::Config {
                message: "either a buildspec or watch paths must be given".to_string(),
                hint: None,
            }),
            (Some(_), false) => Err(Error::Config {
                message: "a buildspec and watch paths are mutually exclusive".to_string(),
                hint: None,
            }),
            _ => Ok(()),
        }
    }
}

/// Per-target success/skip/error tally of a build.
#[derive(Debug, Default)]
pub struct BuildspecReport {
    /// Objects published (or, under dry run, that would have been).
    pub written: usize,
    /// Destinations skipped because the object already exists.
    pub skipped_existing: usize,
    /// Program-level repositories without a local manifest.
    pub skipped_missing: usize,
    /// Collected non-fatal errors.
    pub errors: Vec<Error>,
}

impl BuildspecReport {
    /// Fold the collected errors into the build result: `Ok` when clean.
    pub fn into_result(self) -> Result<BuildspecReport> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::Batch {
                errors: self.errors,
            })
        }
    }
}

/// The buildspec build driver.
pub struct BuildspecBuilder<'a> {
    gitiles: &'a dyn Gitiles,
    store: &'a dyn ObjectStore,
}

impl<'a> BuildspecBuilder<'a> {
    pub fn new(gitiles: &'a dyn Gitiles, store: &'a dyn ObjectStore) -> Self {
        BuildspecBuilder { gitiles, store }
    }

    /// Produce and publish buildspecs for every enumerated path and target.
    pub fn build_all(&self, options: &BuildspecOptions) -> Result<BuildspecReport> {
        options.validate()?;
        let targets = self.expand_targets(&options.targets)?;
        let branches = self.release_branches()?;
        let buildspecs = self.enumerate_buildspecs(options)?;
        info!(
            "building {} buildspec(s) for {} target(s)",
            buildspecs.len(),
            targets.len()
        );

        // Outputs are staged on local disk before upload; the directory is
        // removed on every exit path.
        let scratch = ScratchDir::new("buildspec")?;
        let mut report = BuildspecReport::default();
        for spec in &buildspecs {
            if let Err(err) =
                self.process_buildspec(spec, &targets, &branches, &scratch, options, &mut report)
            {
                warn!("{}", err);
                report.errors.push(err);
            }
        }
        Ok(report)
    }

    /// Expand `program/project` target strings, resolving `*` wildcards
    /// against the projects known to the internal host.
    fn expand_targets(&self, targets: &[String]) -> Result<Vec<Target>> {
        let mut expanded = Vec::new();
        for target in targets {
            let (program, project) = target.split_once('/').ok_or_else(|| Error::Config {
                message: format!("invalid target {}, expected program/project", target),
                hint: None,
            })?;
            if project.contains('*') {
                let pattern = Pattern::new(&format!("chromeos/project/{}", target))?;
                let prefix = format!("chromeos/project/{}/", program);
                for repo in self.gitiles.list_projects(INTERNAL_HOST)? {
                    if pattern.matches(&repo) {
                        if let Some(leaf) = repo.strip_prefix(&prefix) {
                            expanded.push(Target {
                                program: program.to_string(),
                                project: leaf.to_string(),
                            });
                        }
                    }
                }
            } else {
                expanded.push(Target {
                    program: program.to_string(),
                    project: project.to_string(),
                });
            }
        }
        if expanded.is_empty() {
            return Err(Error::Config {
                message: "no targets matched".to_string(),
                hint: None,
            });
        }
        Ok(expanded)
    }

    fn release_branches(&self) -> Result<Vec<ReleaseBranch>> {
        let refs = self
            .gitiles
            .list_refs(INTERNAL_HOST, MANIFEST_INTERNAL_PROJECT)
            .map_err(|e| Error::ReferenceLoad {
                branch: "(branch enumeration)".to_string(),
                message: e.to_string(),
            })?;
        Ok(release_branches(refs.keys().map(|r| r.as_str()), 0))
    }

    /// Enumerate buildspec paths: the explicit one, or everything under the
    /// watch paths with milestone >= the configured minimum.
    fn enumerate_buildspecs(&self, options: &BuildspecOptions) -> Result<Vec<String>> {
        if let Some(explicit) = &options.buildspec {
            return Ok(vec![explicit.clone()]);
        }
        let mut found = Vec::new();
        for watch in &options.watch_paths {
            let watch = watch.trim_end_matches('/');
            let milestones =
                self.gitiles
                    .list_files(INTERNAL_HOST, MANIFEST_VERSIONS_PROJECT, "HEAD", watch)?;
            for milestone in milestones {
                let number: u32 = match milestone.trim_end_matches('/').parse() {
                    Ok(number) => number,
                    Err(_) => continue,
                };
                if number < options.min_milestone {
                    continue;
                }
                let dir = format!("{}/{}", watch, number);
                for file in self.gitiles.list_files(
                    INTERNAL_HOST,
                    MANIFEST_VERSIONS_PROJECT,
                    "HEAD",
                    &dir,
                )? {
                    let path = format!("{}/{}", dir, file);
                    match BuildspecPath::parse(&path) {
                        Ok(_) => found.push(path),
                        Err(_) => warn!("ignoring non-buildspec file {}", path),
                    }
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn process_buildspec(
        &self,
        relpath: &str,
        targets: &[Target],
        branches: &[ReleaseBranch],
        scratch: &ScratchDir,
        options: &BuildspecOptions,
        report: &mut BuildspecReport,
    ) -> Result<()> {
        let spec = BuildspecPath::parse(relpath)?;
        let branch = branch_for_milestone(branches, spec.milestone)?;
        let committish = normalize_ref(&branch);

        let buildspec_xml = self
            .gitiles
            .download_file(INTERNAL_HOST, MANIFEST_VERSIONS_PROJECT, "HEAD", relpath)?
            .ok_or_else(|| Error::ReferenceLoad {
                branch: relpath.to_string(),
                message: "buildspec not found in manifest-versions".to_string(),
            })?;
        let buildspec = Manifest::parse(&buildspec_xml, relpath).map_err(|e| {
            Error::ReferenceLoad {
                branch: relpath.to_string(),
                message: e.to_string(),
            }
        })?;

        for target in targets {
            let repos = [
                (target.program_repo(), target.program_bucket(), false),
                (target.project_repo(), target.project_bucket(), true),
            ];
            for (repo, bucket, required) in repos {
                if let Err(err) = self.publish_one(
                    relpath, &branch, &committish, &buildspec, &repo, &bucket, required, scratch,
                    options, report,
                ) {
                    warn!("{}", err);
                    report.errors.push(err);
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn publish_one(
        &self,
        relpath: &str,
        branch: &str,
        committish: &str,
        buildspec: &Manifest,
        repo: &str,
        bucket: &str,
        required: bool,
        scratch: &ScratchDir,
        options: &BuildspecOptions,
        report: &mut BuildspecReport,
    ) -> Result<()> {
        let destination = GsPath::new(bucket, format!("buildspecs/{}", relpath));
        if !options.force && self.store.exists(&destination)? {
            info!("{} already exists, skipping (use force to overwrite)", destination);
            report.skipped_existing += 1;
            return Ok(());
        }

        let local_xml = self
            .gitiles
            .download_file(INTERNAL_HOST, repo, committish, LOCAL_MANIFEST)?;
        let local_xml = match local_xml {
            Some(content) => content,
            None if required => {
                return Err(Error::TargetLoad {
                    branch: branch.to_string(),
                    project: repo.to_string(),
                    message: "local_manifest.xml not found".to_string(),
                });
            }
            None => {
                warn!("{}: no local_manifest.xml at {}, skipping", repo, branch);
                report.skipped_missing += 1;
                return Ok(());
            }
        };
        let local = Manifest::parse(&local_xml, &format!("{}:{}", repo, LOCAL_MANIFEST)).map_err(
            |e| Error::TargetLoad {
                branch: branch.to_string(),
                project: repo.to_string(),
                message: e.to_string(),
            },
        )?;

        let pinned = pin_manifest(&local, buildspec);
        if !pinned.missing_projects.is_empty() {
            warn!(
                "{}: {} project(s) missing from buildspec {}: {:?}",
                repo,
                pinned.missing_projects.len(),
                relpath,
                pinned.missing_projects
            );
        }
        let output = pinned.pinned_manifest.to_xml();
        let staged = scratch.path().join(format!(
            "{}-{}",
            bucket,
            relpath.replace('/', "-")
        ));
        std::fs::write(&staged, &output)?;

        if options.dry_run {
            info!("would have written {} (dry run)", destination);
        } else {
            let staged_bytes = std::fs::read(&staged)?;
            self.store.write(&destination, &staged_bytes)?;
            if let Some(days) = options.ttl_days {
                self.store
                    .set_ttl(&destination, Duration::from_secs(u64::from(days) * 24 * 3600))?;
            }
            info!("wrote {}", destination);
        }
        report.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const UNPINNED_LOCAL: &str = r#"<manifest>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com"/>
  <project name="foo" path="src/foo" remote="cros-internal"/>
  <project name="bar" path="src/bar" remote="cros-internal"/>
</manifest>
"#;

    const BUILDSPEC: &str = r#"<manifest>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com"/>
  <project name="foo" path="src/foo" revision="revision-foo" remote="cros-internal"/>
  <project name="baz" path="src/baz" revision="revision-baz" remote="cros-internal"/>
</manifest>
"#;

    #[derive(Default)]
    struct FakeGitiles {
        /// (project, committish, path) -> content
        files: HashMap<(String, String, String), String>,
        /// project -> refs
        refs: HashMap<String, HashMap<String, String>>,
        /// (project, path) -> entries
        listings: HashMap<(String, String), Vec<String>>,
        projects: Vec<String>,
    }

    impl FakeGitiles {
        fn add_file(&mut self, project: &str, committish: &str, path: &str, content: &str) {
            self.files.insert(
                (
                    project.to_string(),
                    committish.to_string(),
                    path.to_string(),
                ),
                content.to_string(),
            );
        }

        fn add_release_refs(&mut self) {
            let mut refs = HashMap::new();
            refs.insert("refs/heads/main".to_string(), "deadcafe".to_string());
            refs.insert(
                "refs/heads/release-R93-13816.B".to_string(),
                "deadbeef".to_string(),
            );
            refs.insert(
                "refs/heads/release-R94-13904.B".to_string(),
                "beefcafe".to_string(),
            );
            self.refs
                .insert(MANIFEST_INTERNAL_PROJECT.to_string(), refs);
        }
    }

    impl Gitiles for FakeGitiles {
        fn download_file(
            &self,
            _host: &str,
            project: &str,
            committish: &str,
            path: &str,
        ) -> Result<Option<String>> {
            Ok(self
                .files
                .get(&(
                    project.to_string(),
                    committish.to_string(),
                    path.to_string(),
                ))
                .cloned())
        }

        fn list_refs(&self, _host: &str, project: &str) -> Result<HashMap<String, String>> {
            Ok(self.refs.get(project).cloned().unwrap_or_default())
        }

        fn list_files(
            &self,
            _host: &str,
            project: &str,
            _committish: &str,
            path: &str,
        ) -> Result<Vec<String>> {
            Ok(self
                .listings
                .get(&(project.to_string(), path.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        fn list_projects(&self, _host: &str) -> Result<Vec<String>> {
            Ok(self.projects.clone())
        }
    }

    /// Gitiles fixture for one buildspec on R93 with program and project
    /// local manifests in place.
    fn fixture(buildspec_path: &str, branch: &str) -> FakeGitiles {
        let mut fake = FakeGitiles::default();
        fake.add_release_refs();
        fake.add_file(MANIFEST_VERSIONS_PROJECT, "HEAD", buildspec_path, BUILDSPEC);
        let committish = format!("refs/heads/{}", branch);
        fake.add_file(
            "chromeos/program/galaxy",
            &committish,
            "local_manifest.xml",
            UNPINNED_LOCAL,
        );
        fake.add_file(
            "chromeos/project/galaxy/milkyway",
            &committish,
            "local_manifest.xml",
            UNPINNED_LOCAL,
        );
        fake
    }

    fn options(buildspec: &str) -> BuildspecOptions {
        BuildspecOptions {
            buildspec: Some(buildspec.to_string()),
            targets: vec!["galaxy/milkyway".to_string()],
            ..BuildspecOptions::default()
        }
    }

    #[test]
    fn test_build_writes_program_and_project_buckets() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let fake = fixture(spec, "release-R93-13816.B");
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());

        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&options(spec)).unwrap();
        assert_eq!(report.written, 2);
        assert!(report.errors.is_empty());

        for bucket in ["chromeos-galaxy", "chromeos-galaxy-milkyway"] {
            let path = GsPath::new(bucket, format!("buildspecs/{}", spec));
            let written = String::from_utf8(store.read(&path).unwrap()).unwrap();
            let manifest = Manifest::parse(&written, "written").unwrap();
            assert_eq!(
                manifest.project_by_path("src/foo").unwrap().revision,
                "revision-foo"
            );
            // bar is not in the buildspec; its revision stays untouched.
            assert_eq!(manifest.project_by_path("src/bar").unwrap().revision, "");
        }
    }

    #[test]
    fn test_build_attaches_ttl() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let fake = fixture(spec, "release-R93-13816.B");
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());

        let mut opts = options(spec);
        opts.ttl_days = Some(90);
        let builder = BuildspecBuilder::new(&fake, &store);
        builder.build_all(&opts).unwrap();

        // The local store records TTLs in sidecar files.
        let sidecar = temp
            .path()
            .join("chromeos-galaxy")
            .join(format!("buildspecs/{}.ttl", spec));
        let seconds: u64 = std::fs::read_to_string(sidecar).unwrap().parse().unwrap();
        assert_eq!(seconds, 90 * 24 * 3600);
    }

    #[test]
    fn test_build_dry_run_writes_nothing() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let fake = fixture(spec, "release-R93-13816.B");
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());

        let mut opts = options(spec);
        opts.dry_run = true;
        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&opts).unwrap();
        assert_eq!(report.written, 2);
        assert!(store.list("chromeos-galaxy", "").unwrap().is_empty());
        assert!(store.list("chromeos-galaxy-milkyway", "").unwrap().is_empty());
    }

    #[test]
    fn test_build_skips_existing_without_force() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let fake = fixture(spec, "release-R93-13816.B");
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        for bucket in ["chromeos-galaxy", "chromeos-galaxy-milkyway"] {
            store
                .write(&GsPath::new(bucket, format!("buildspecs/{}", spec)), b"old")
                .unwrap();
        }

        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&options(spec)).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped_existing, 2);
        let path = GsPath::new("chromeos-galaxy", format!("buildspecs/{}", spec));
        assert_eq!(store.read(&path).unwrap(), b"old");
    }

    #[test]
    fn test_build_force_overwrites() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let fake = fixture(spec, "release-R93-13816.B");
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        let path = GsPath::new("chromeos-galaxy", format!("buildspecs/{}", spec));
        store.write(&path, b"old").unwrap();

        let mut opts = options(spec);
        opts.force = true;
        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&opts).unwrap();
        assert_eq!(report.written, 2);
        assert_ne!(store.read(&path).unwrap(), b"old");
    }

    #[test]
    fn test_build_tot_buildspec_reads_main() {
        // Milestone 96 has no release branch (and 95 was skipped): trunk.
        let spec = "full/buildspecs/96/13811.0.0-rc2.xml";
        let fake = fixture(spec, "main");
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());

        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&options(spec)).unwrap();
        assert_eq!(report.written, 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_build_program_404_is_graceful_project_404_fatal() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let mut fake = FakeGitiles::default();
        fake.add_release_refs();
        fake.add_file(MANIFEST_VERSIONS_PROJECT, "HEAD", spec, BUILDSPEC);
        // Neither the program nor the project repo has a local manifest.
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());

        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&options(spec)).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped_missing, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_watch_paths_enumerate_and_filter_by_milestone() {
        let mut fake = FakeGitiles::default();
        fake.add_release_refs();
        for (dir, files) in [
            ("full/buildspecs", vec!["93", "94"]),
            ("buildspecs", vec!["93", "94"]),
        ] {
            fake.listings.insert(
                (MANIFEST_VERSIONS_PROJECT.to_string(), dir.to_string()),
                files.into_iter().map(String::from).collect(),
            );
        }
        fake.listings.insert(
            (
                MANIFEST_VERSIONS_PROJECT.to_string(),
                "full/buildspecs/94".to_string(),
            ),
            vec!["13010.0.0-rc1.xml".to_string(), "13011.0.0-rc1.xml".to_string()],
        );
        fake.listings.insert(
            (
                MANIFEST_VERSIONS_PROJECT.to_string(),
                "buildspecs/94".to_string(),
            ),
            vec!["13010.0.0.xml".to_string(), "13011.0.0.xml".to_string()],
        );
        let committish = "refs/heads/release-R94-13904.B";
        for path in [
            "full/buildspecs/94/13010.0.0-rc1.xml",
            "full/buildspecs/94/13011.0.0-rc1.xml",
            "buildspecs/94/13010.0.0.xml",
            "buildspecs/94/13011.0.0.xml",
        ] {
            fake.add_file(MANIFEST_VERSIONS_PROJECT, "HEAD", path, BUILDSPEC);
        }
        fake.add_file(
            "chromeos/program/galaxy",
            committish,
            "local_manifest.xml",
            UNPINNED_LOCAL,
        );
        fake.add_file(
            "chromeos/project/galaxy/milkyway",
            committish,
            "local_manifest.xml",
            UNPINNED_LOCAL,
        );

        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        let opts = BuildspecOptions {
            watch_paths: vec!["full/buildspecs/".to_string(), "buildspecs/".to_string()],
            min_milestone: 94,
            targets: vec!["galaxy/milkyway".to_string()],
            ..BuildspecOptions::default()
        };
        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&opts).unwrap();
        // Four buildspecs, two buckets each; milestone 93 was never listed.
        assert_eq!(report.written, 8);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_wildcard_target_expansion() {
        let spec = "full/buildspecs/93/13811.0.0.xml";
        let mut fake = fixture(spec, "release-R93-13816.B");
        fake.projects = vec![
            "chromeos/project/galaxy/milkyway".to_string(),
            "chromeos/project/galaxy/andromeda".to_string(),
            "chromeos/foo".to_string(),
        ];
        fake.add_file(
            "chromeos/project/galaxy/andromeda",
            "refs/heads/release-R93-13816.B",
            "local_manifest.xml",
            UNPINNED_LOCAL,
        );

        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        let mut opts = options(spec);
        opts.targets = vec!["galaxy/*".to_string()];
        let builder = BuildspecBuilder::new(&fake, &store);
        let report = builder.build_all(&opts).unwrap();
        // Two project buckets plus the shared program bucket; the second
        // program-level publish finds the object already in place.
        assert_eq!(report.written, 3);
        assert_eq!(report.skipped_existing, 1);
        assert!(store
            .exists(&GsPath::new(
                "chromeos-galaxy-andromeda",
                format!("buildspecs/{}", spec)
            ))
            .unwrap());
    }

    #[test]
    fn test_options_validation() {
        let builder_opts = BuildspecOptions {
            targets: vec![],
            buildspec: Some("buildspecs/93/1.0.0.xml".to_string()),
            ..BuildspecOptions::default()
        };
        assert!(builder_opts.validate().is_err());

        let neither = BuildspecOptions {
            targets: vec!["a/b".to_string()],
            ..BuildspecOptions::default()
        };
        assert!(neither.validate().is_err());

        let both = BuildspecOptions {
            targets: vec!["a/b".to_string()],
            buildspec: Some("x".to_string()),
            watch_paths: vec!["y".to_string()],
            ..BuildspecOptions::default()
        };
        assert!(both.validate().is_err());
    }
}
