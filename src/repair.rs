//! # Local Manifest Repair
//!
//! The commit/push driver and the per-branch batch loop behind the
//! `branch` command: for every active release branch, the canonical
//! manifest is loaded from the manifest-internal checkout and every
//! configured project's `local_manifest.xml` is pinned to the same
//! revisions, committed, and pushed for direct submission.
//!
//! ## Batch shape
//!
//! Branches are processed sequentially on the coordinator: the
//! manifest-internal working tree is checked out once per branch and only
//! the in-memory reference manifest is shared with workers. Projects within
//! a branch fan out over the worker pool; work items always address
//! distinct project paths, so no two workers ever touch the same git tree.
//!
//! ## Idempotence
//!
//! Re-running a converged branch/project pair is a no-op: the minimal-diff
//! rewriter reports "unchanged" and no commit or push is issued. On top of
//! that, the memoization store skips projects whose recorded canonical SHA
//! still matches, without even checking out the project.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::branches::active_branches;
use crate::error::{Error, Result};
use crate::git::{GitOps, RemoteRef};
use crate::loader;
use crate::manifest::Manifest;
use crate::memo::{read_or_empty, MemoStore};
use crate::pin::pin_manifest;
use crate::pool::{run_items, CancelToken};
use crate::retry::{deadline_exceeded, earlier_deadline, with_retry, RetryOptions};
use crate::rewrite::rewrite;

/// Location of the manifest-internal project within a checkout.
pub const MANIFEST_INTERNAL_PATH: &str = "manifest-internal";

/// The canonical manifest file within manifest-internal.
pub const ROOT_MANIFEST: &str = "default.xml";

/// Per-project manifest file name.
pub const LOCAL_MANIFEST: &str = "local_manifest.xml";

/// Each push gets its own deadline on top of the batch deadline.
const PUSH_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// The commit message for a repaired local manifest is fully determined by
/// the branch.
pub fn commit_message(branch: &str) -> String {
    format!(
        "Repair local_manifest.xml for branch {}\n\nThis CL was created by the Manifest Doctor.\n",
        branch
    )
}

/// One unit of repair work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub branch: String,
    pub project_path: String,
    /// SHA of the manifest-internal commit the reference manifest came from.
    pub reference_ref: String,
    pub dry_run: bool,
}

/// Outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairStatus {
    /// The branch or the local manifest does not exist for this project.
    Skipped,
    /// The local manifest is already converged; nothing was written.
    NoOp,
    /// Changes were committed (and pushed, modulo dry run).
    Committed { sha: String },
}

/// Options for a repair batch.
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Path to the full checkout containing manifest-internal and projects.
    pub checkout: PathBuf,
    /// Project paths (relative to the checkout) to repair.
    pub projects: Vec<String>,
    /// Minimum milestone of release branches to consider.
    pub min_milestone: u32,
    /// Milestone currently on trunk; enables processing `main`.
    pub trunk_milestone: Option<u32>,
    /// Explicit branch list; short-circuits derivation entirely.
    pub branches: Option<Vec<String>>,
    /// Git remote used to probe and fetch project branches.
    pub remote: String,
    /// When true, pushes carry `--dry-run` and memoization is not updated.
    pub dry_run: bool,
    /// Worker pool size for projects within a branch.
    pub concurrency: usize,
    /// Overall batch deadline.
    pub deadline: Option<Instant>,
}

impl RepairOptions {
    /// Check the options a batch cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.min_milestone == 0 && self.branches.is_none() {
            return Err(Error::Config {
                message: "a minimum milestone is required".to_string(),
                hint: Some("pass --min-milestone or an explicit branch list".to_string()),
            });
        }
        if !self.checkout.exists() {
            return Err(Error::Config {
                message: format!("checkout path {} does not exist", self.checkout.display()),
                hint: None,
            });
        }
        if self.projects.is_empty() {
            return Err(Error::Config {
                message: "at least one project is required".to_string(),
                hint: None,
            });
        }
        Ok(())
    }
}

/// Tally of a finished batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Work items that committed (or would have, under dry run).
    pub committed: usize,
    /// Work items whose local manifest was already converged.
    pub noop: usize,
    /// Work items skipped for missing branch or missing local manifest.
    pub skipped: usize,
    /// Work items skipped by the memoization pre-check.
    pub memoized: usize,
    /// Collected non-fatal errors.
    pub errors: Vec<Error>,
}

impl BatchReport {
    /// Fold the collected errors into the batch result: `Ok` when clean.
    pub fn into_result(self) -> Result<BatchReport> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::Batch {
                errors: self.errors,
            })
        }
    }
}

/// The repair driver.
pub struct Repairer<'a> {
    git: &'a dyn GitOps,
    memo: &'a dyn MemoStore,
    options: RepairOptions,
}

impl<'a> Repairer<'a> {
    pub fn new(git: &'a dyn GitOps, memo: &'a dyn MemoStore, options: RepairOptions) -> Self {
        Repairer { git, memo, options }
    }

    /// Run the batch over every active branch.
    pub fn run(&self, cancel: &CancelToken) -> Result<BatchReport> {
        self.options.validate()?;
        let manifest_internal = self.options.checkout.join(MANIFEST_INTERNAL_PATH);
        if !manifest_internal.exists() {
            return Err(Error::Config {
                message: format!(
                    "manifest-internal checkout not found at {}",
                    manifest_internal.display()
                ),
                hint: None,
            });
        }

        let branches = match &self.options.branches {
            Some(explicit) => explicit.clone(),
            None => {
                let refs = self
                    .git
                    .ls_remote_refs(&manifest_internal, &self.options.remote)
                    .map_err(|e| Error::ReferenceLoad {
                        branch: "(branch enumeration)".to_string(),
                        message: e.to_string(),
                    })?;
                active_branches(
                    refs.iter().map(|r| r.as_str()),
                    self.options.min_milestone,
                    self.options.trunk_milestone,
                    None,
                )
            }
        };
        info!("processing {} branch(es): {:?}", branches.len(), branches);

        let mut report = BatchReport::default();
        for branch in &branches {
            if cancel.is_cancelled() || deadline_exceeded(self.options.deadline) {
                report.errors.push(Error::DeadlineExceeded {
                    operation: format!("branch {}", branch),
                });
                continue;
            }
            if let Err(err) = self.repair_branch(branch, &manifest_internal, cancel, &mut report) {
                error!("{}", err);
                report.errors.push(err);
            }
        }
        Ok(report)
    }

    /// Process one branch: check out manifest-internal, load the reference,
    /// fan projects out over the pool, and update memoization.
    fn repair_branch(
        &self,
        branch: &str,
        manifest_internal: &std::path::Path,
        cancel: &CancelToken,
        report: &mut BatchReport,
    ) -> Result<()> {
        self.git
            .checkout(manifest_internal, branch)
            .map_err(|e| Error::ReferenceLoad {
                branch: branch.to_string(),
                message: format!("failed to checkout branch in manifest-internal: {}", e),
            })?;

        let reference =
            loader::load_manifest_from_file_with_includes(&manifest_internal.join(ROOT_MANIFEST))
                .map_err(|e| Error::ReferenceLoad {
                    branch: branch.to_string(),
                    message: e.to_string(),
                })?;

        let canonical_sha =
            self.git
                .rev_parse_head(manifest_internal)
                .map_err(|e| Error::ReferenceLoad {
                    branch: branch.to_string(),
                    message: format!("failed to rev-parse HEAD: {}", e),
                })?;

        let (mut memo, exists) = read_or_empty(self.memo, branch);

        let mut items = Vec::new();
        for project in &self.options.projects {
            match memo.prev_shas.get(project) {
                None => {
                    warn!("{}, {}: no history, not skipping", branch, project);
                }
                Some(previous) if previous == &canonical_sha => {
                    info!(
                        "{}, {}: no change in reference manifest since last pin, skipping...",
                        branch, project
                    );
                    report.memoized += 1;
                    continue;
                }
                Some(_) => {}
            }
            items.push(WorkItem {
                branch: branch.to_string(),
                project_path: project.clone(),
                reference_ref: canonical_sha.clone(),
                dry_run: self.options.dry_run,
            });
        }

        let results = run_items(
            &items,
            self.options.concurrency,
            cancel,
            self.options.deadline,
            |item| {
                self.repair_work_item(item, &reference)
                    .map(|status| (item.project_path.clone(), status))
            },
            |item| Error::Cancelled {
                branch: item.branch.clone(),
                project: item.project_path.clone(),
            },
        );

        let mut dirty = false;
        for result in results {
            match result {
                Ok((path, RepairStatus::Committed { .. })) => {
                    report.committed += 1;
                    if !self.options.dry_run {
                        memo.prev_shas.insert(path, canonical_sha.clone());
                        dirty = true;
                    }
                }
                Ok((_, RepairStatus::NoOp)) => report.noop += 1,
                Ok((_, RepairStatus::Skipped)) => report.skipped += 1,
                Err(err) => {
                    error!("{}", err);
                    report.errors.push(err);
                }
            }
        }

        if dirty && !self.options.dry_run {
            if let Err(err) = self.memo.write(branch, &memo, exists) {
                warn!(
                    "failed to store memoization data for branch {}: {}",
                    branch, err
                );
            }
        }
        Ok(())
    }

    /// Run one work item end-to-end: probe, fetch, check out, pin, rewrite,
    /// commit, push.
    pub fn repair_work_item(&self, item: &WorkItem, reference: &Manifest) -> Result<RepairStatus> {
        let branch = item.branch.as_str();
        let path = item.project_path.as_str();
        let item_err = |message: String| Error::TargetLoad {
            branch: branch.to_string(),
            project: path.to_string(),
            message,
        };

        let project_dir = self.options.checkout.join(path);
        if !project_dir.exists() {
            return Err(item_err(format!(
                "project path {} does not exist",
                project_dir.display()
            )));
        }

        let has_branch = self
            .git
            .remote_has_branch(&project_dir, &self.options.remote, branch)
            .map_err(|e| item_err(format!("failed to ls-remote branch from remote: {}", e)))?;
        if !has_branch {
            info!("{}, {}: branch does not exist for project, skipping...", branch, path);
            return Ok(RepairStatus::Skipped);
        }
        self.git
            .fetch(&project_dir, &self.options.remote, branch)
            .map_err(|e| item_err(format!("failed to fetch branch from remote: {}", e)))?;
        self.git
            .checkout(&project_dir, branch)
            .map_err(|e| item_err(format!("failed to checkout branch: {}", e)))?;

        let local_manifest = project_dir.join(LOCAL_MANIFEST);
        if !local_manifest.exists() {
            info!("{}, {}: local_manifest.xml does not exist, skipping...", branch, path);
            return Ok(RepairStatus::Skipped);
        }

        let raw = std::fs::read_to_string(&local_manifest)
            .map_err(|e| item_err(format!("failed to read local_manifest.xml: {}", e)))?;
        let target = Manifest::parse(&raw, &local_manifest.display().to_string())
            .map_err(|e| item_err(format!("failed to load local_manifest.xml: {}", e)))?;

        let pinned = pin_manifest(&target, reference);
        let (new_text, changed) = rewrite(&raw, &pinned.pinned_manifest, false)
            .map_err(|e| item_err(format!("failed to rewrite local_manifest.xml: {}", e)))?;

        if !changed {
            info!("{}, {}: no changes needed", branch, path);
            return Ok(RepairStatus::NoOp);
        }
        std::fs::write(&local_manifest, &new_text)
            .map_err(|e| item_err(format!("failed to write local_manifest.xml: {}", e)))?;

        let sha = self
            .git
            .commit_all(&project_dir, &commit_message(branch))
            .map_err(|e| item_err(format!("failed to commit changes: {}", e)))?;

        let remotes = self
            .git
            .get_remotes(&project_dir)
            .map_err(|e| item_err(format!("failed to get remotes for checkout: {}", e)))?;
        let push_remote = match remotes.len() {
            0 => {
                return Err(Error::NoRemote {
                    project: path.to_string(),
                })
            }
            1 => remotes[0].clone(),
            count => {
                return Err(Error::AmbiguousRemote {
                    project: path.to_string(),
                    count,
                })
            }
        };

        let remote_ref = RemoteRef {
            remote: push_remote,
            // Gerrit direct submit.
            ref_name: format!("refs/for/{}%submit", branch),
        };
        let push_deadline = earlier_deadline(
            self.options.deadline,
            Some(Instant::now() + PUSH_DEADLINE),
        );
        with_retry(&RetryOptions::push_defaults(), push_deadline, || {
            self.git
                .push_ref(&project_dir, "HEAD", &remote_ref, item.dry_run)
        })?;

        if item.dry_run {
            info!("{}, {}: would have committed changes (dry run)", branch, path);
        } else {
            info!("{}, {}: committed changes", branch, path);
        }
        Ok(RepairStatus::Committed { sha })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::{BranchMemo, InMemoryStore};
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const REFERENCE_XML: &str = r#"<manifest>
  <remote name="cros-internal" fetch="https://chrome-internal.googlesource.com"/>
  <default remote="cros-internal" revision="refs/heads/main"/>
  <project name="foo" path="src/foo" revision="refs/heads/release-R90-13816.B"/>
</manifest>
"#;

    const UNPINNED_LOCAL: &str = r#"<manifest>
  <remote name="cros-internal"
          fetch="https://chrome-internal.googlesource.com"
          review="https://chrome-internal-review.googlesource.com" />
  <project name="foo"
           path="src/foo"
           revision="refs/heads/main"
           remote="cros-internal" />
</manifest>
"#;

    const PINNED_LOCAL: &str = r#"<manifest>
  <remote name="cros-internal"
          fetch="https://chrome-internal.googlesource.com"
          review="https://chrome-internal-review.googlesource.com" />
  <project name="foo"
           path="src/foo"
           revision="refs/heads/release-R90-13816.B"
           remote="cros-internal" />
</manifest>
"#;

    #[derive(Default)]
    struct MockGit {
        missing_branches: HashSet<String>,
        remotes: Vec<String>,
        refs: Vec<String>,
        head_sha: String,
        checkouts: Mutex<Vec<(PathBuf, String)>>,
        fetches: Mutex<Vec<(PathBuf, String)>>,
        commits: Mutex<Vec<(PathBuf, String)>>,
        pushes: Mutex<Vec<(PathBuf, RemoteRef, bool)>>,
        push_failures: Mutex<Vec<Error>>,
    }

    impl MockGit {
        fn new() -> Self {
            MockGit {
                remotes: vec!["cros-internal".to_string()],
                head_sha: "canonical-sha".to_string(),
                ..MockGit::default()
            }
        }
    }

    impl GitOps for MockGit {
        fn remote_has_branch(&self, _repo: &Path, _remote: &str, branch: &str) -> Result<bool> {
            Ok(!self.missing_branches.contains(branch))
        }

        fn fetch(&self, repo: &Path, _remote: &str, refspec: &str) -> Result<()> {
            self.fetches
                .lock()
                .unwrap()
                .push((repo.to_path_buf(), refspec.to_string()));
            Ok(())
        }

        fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
            self.checkouts
                .lock()
                .unwrap()
                .push((repo.to_path_buf(), branch.to_string()));
            Ok(())
        }

        fn commit_all(&self, repo: &Path, message: &str) -> Result<String> {
            self.commits
                .lock()
                .unwrap()
                .push((repo.to_path_buf(), message.to_string()));
            Ok("new-sha".to_string())
        }

        fn get_remotes(&self, _repo: &Path) -> Result<Vec<String>> {
            Ok(self.remotes.clone())
        }

        fn push_ref(
            &self,
            repo: &Path,
            _local_ref: &str,
            remote_ref: &RemoteRef,
            dry_run: bool,
        ) -> Result<()> {
            if let Some(err) = self.push_failures.lock().unwrap().pop() {
                return Err(err);
            }
            self.pushes
                .lock()
                .unwrap()
                .push((repo.to_path_buf(), remote_ref.clone(), dry_run));
            Ok(())
        }

        fn rev_parse_head(&self, _repo: &Path) -> Result<String> {
            Ok(self.head_sha.clone())
        }

        fn ls_remote_refs(&self, _repo: &Path, _remote: &str) -> Result<Vec<String>> {
            Ok(self.refs.clone())
        }
    }

    /// A checkout with manifest-internal and one project at src/foo.
    fn make_checkout(local_manifest: Option<&str>) -> TempDir {
        let temp = TempDir::new().unwrap();
        let internal = temp.path().join(MANIFEST_INTERNAL_PATH);
        std::fs::create_dir_all(&internal).unwrap();
        std::fs::write(internal.join(ROOT_MANIFEST), REFERENCE_XML).unwrap();
        let project = temp.path().join("src/foo");
        std::fs::create_dir_all(&project).unwrap();
        if let Some(content) = local_manifest {
            std::fs::write(project.join(LOCAL_MANIFEST), content).unwrap();
        }
        temp
    }

    fn options(checkout: &Path) -> RepairOptions {
        RepairOptions {
            checkout: checkout.to_path_buf(),
            projects: vec!["src/foo".to_string()],
            min_milestone: 90,
            trunk_milestone: None,
            branches: Some(vec!["release-R90-13816.B".to_string()]),
            remote: "cros-internal".to_string(),
            dry_run: false,
            concurrency: 2,
            deadline: None,
        }
    }

    fn reference() -> Manifest {
        Manifest::parse(REFERENCE_XML, "reference").unwrap()
    }

    fn work_item(dry_run: bool) -> WorkItem {
        WorkItem {
            branch: "release-R90-13816.B".to_string(),
            project_path: "src/foo".to_string(),
            reference_ref: "canonical-sha".to_string(),
            dry_run,
        }
    }

    #[test]
    fn test_work_item_noop_when_converged() {
        let checkout = make_checkout(Some(PINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let status = repairer.repair_work_item(&work_item(false), &reference()).unwrap();
        assert_eq!(status, RepairStatus::NoOp);
        assert!(git.commits.lock().unwrap().is_empty());
        assert!(git.pushes.lock().unwrap().is_empty());
        // File is untouched.
        let on_disk =
            std::fs::read_to_string(checkout.path().join("src/foo").join(LOCAL_MANIFEST)).unwrap();
        assert_eq!(on_disk, PINNED_LOCAL);
    }

    #[test]
    fn test_work_item_commits_minimal_change() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let status = repairer.repair_work_item(&work_item(false), &reference()).unwrap();
        assert_eq!(
            status,
            RepairStatus::Committed {
                sha: "new-sha".to_string()
            }
        );

        // Only the revision attribute changed.
        let on_disk =
            std::fs::read_to_string(checkout.path().join("src/foo").join(LOCAL_MANIFEST)).unwrap();
        assert_eq!(on_disk, PINNED_LOCAL);

        let commits = git.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(
            commits[0].1,
            "Repair local_manifest.xml for branch release-R90-13816.B\n\nThis CL was created by the Manifest Doctor.\n"
        );

        let pushes = git.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].1.remote, "cros-internal");
        assert_eq!(pushes[0].1.ref_name, "refs/for/release-R90-13816.B%submit");
        assert!(!pushes[0].2);
    }

    #[test]
    fn test_work_item_dry_run_pushes_with_flag() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let status = repairer.repair_work_item(&work_item(true), &reference()).unwrap();
        assert!(matches!(status, RepairStatus::Committed { .. }));
        let pushes = git.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].2, "dry-run flag must reach the push");
    }

    #[test]
    fn test_work_item_skips_missing_branch() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let mut git = MockGit::new();
        git.missing_branches.insert("release-R90-13816.B".to_string());
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let status = repairer.repair_work_item(&work_item(false), &reference()).unwrap();
        assert_eq!(status, RepairStatus::Skipped);
        // Nothing was fetched beyond the ls-remote probe.
        assert!(git.fetches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_work_item_skips_missing_local_manifest() {
        let checkout = make_checkout(None);
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let status = repairer.repair_work_item(&work_item(false), &reference()).unwrap();
        assert_eq!(status, RepairStatus::Skipped);
    }

    #[test]
    fn test_work_item_missing_project_path() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let mut opts = options(checkout.path());
        opts.projects = vec!["src/absent".to_string()];
        let repairer = Repairer::new(&git, &memo, opts);

        let mut item = work_item(false);
        item.project_path = "src/absent".to_string();
        let err = repairer.repair_work_item(&item, &reference()).unwrap_err();
        assert!(format!("{}", err).contains("does not exist"));
    }

    #[test]
    fn test_work_item_ambiguous_remote() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let mut git = MockGit::new();
        git.remotes = vec!["cros-internal".to_string(), "origin".to_string()];
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let err = repairer.repair_work_item(&work_item(false), &reference()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousRemote { count: 2, .. }));
    }

    #[test]
    fn test_work_item_no_remote() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let mut git = MockGit::new();
        git.remotes = Vec::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let err = repairer.repair_work_item(&work_item(false), &reference()).unwrap_err();
        assert!(matches!(err, Error::NoRemote { .. }));
    }

    #[test]
    fn test_work_item_push_retried_on_transient_error() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        git.push_failures.lock().unwrap().push(Error::Transient {
            operation: "push".to_string(),
            message: "connection reset".to_string(),
        });
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let status = repairer.repair_work_item(&work_item(false), &reference()).unwrap();
        assert!(matches!(status, RepairStatus::Committed { .. }));
        assert_eq!(git.pushes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_work_item_push_rejection_fails_fast() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        git.push_failures.lock().unwrap().push(Error::PushRejected {
            project: "src/foo".to_string(),
            branch: "release-R90-13816.B".to_string(),
            stderr: "prohibited by Gerrit".to_string(),
        });
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let err = repairer.repair_work_item(&work_item(false), &reference()).unwrap_err();
        assert!(matches!(err, Error::PushRejected { .. }));
        assert!(git.pushes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_batch_commits_and_updates_memo() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let report = repairer.run(&CancelToken::new()).unwrap();
        assert_eq!(report.committed, 1);
        assert!(report.errors.is_empty());

        let record = memo.get("release-R90-13816.B").unwrap();
        assert_eq!(
            record.prev_shas.get("src/foo"),
            Some(&"canonical-sha".to_string())
        );
    }

    #[test]
    fn test_batch_memo_pre_check_skips_project() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let mut record = BranchMemo::default();
        record
            .prev_shas
            .insert("src/foo".to_string(), "canonical-sha".to_string());
        memo.write("release-R90-13816.B", &record, false).unwrap();

        let repairer = Repairer::new(&git, &memo, options(checkout.path()));
        let report = repairer.run(&CancelToken::new()).unwrap();

        assert_eq!(report.memoized, 1);
        assert_eq!(report.committed, 0);
        assert!(git.pushes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_batch_noop_does_not_touch_memo() {
        let checkout = make_checkout(Some(PINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let repairer = Repairer::new(&git, &memo, options(checkout.path()));

        let report = repairer.run(&CancelToken::new()).unwrap();
        assert_eq!(report.noop, 1);
        assert!(memo.get("release-R90-13816.B").is_none());
    }

    #[test]
    fn test_batch_dry_run_does_not_update_memo() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let mut opts = options(checkout.path());
        opts.dry_run = true;
        let repairer = Repairer::new(&git, &memo, opts);

        let report = repairer.run(&CancelToken::new()).unwrap();
        assert_eq!(report.committed, 1);
        assert!(memo.get("release-R90-13816.B").is_none());
        // The push still went out, flagged as a dry run.
        let pushes = git.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].2);
    }

    #[test]
    fn test_batch_derives_branches_from_refs() {
        let checkout = make_checkout(Some(PINNED_LOCAL));
        let mut git = MockGit::new();
        git.refs = vec![
            "refs/heads/main".to_string(),
            "refs/heads/release-R90-13816.B".to_string(),
            "refs/heads/release-R89-13729.B".to_string(),
        ];
        let memo = InMemoryStore::new();
        let mut opts = options(checkout.path());
        opts.branches = None;
        opts.min_milestone = 90;
        let repairer = Repairer::new(&git, &memo, opts);

        let report = repairer.run(&CancelToken::new()).unwrap();
        assert!(report.errors.is_empty());
        // Only R90 qualifies; manifest-internal was checked out there.
        let checkouts = git.checkouts.lock().unwrap();
        assert!(checkouts
            .iter()
            .any(|(_, branch)| branch == "release-R90-13816.B"));
        assert!(!checkouts
            .iter()
            .any(|(_, branch)| branch == "release-R89-13729.B"));
    }

    #[test]
    fn test_batch_continues_after_item_error() {
        let checkout = make_checkout(Some(UNPINNED_LOCAL));
        let git = MockGit::new();
        let memo = InMemoryStore::new();
        let mut opts = options(checkout.path());
        opts.projects = vec!["src/absent".to_string(), "src/foo".to_string()];
        let repairer = Repairer::new(&git, &memo, opts);

        let report = repairer.run(&CancelToken::new()).unwrap();
        assert_eq!(report.committed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let checkout = make_checkout(None);
        let mut opts = options(checkout.path());
        opts.projects.clear();
        assert!(opts.validate().is_err());

        let mut opts = options(checkout.path());
        opts.checkout = PathBuf::from("/nonexistent/checkout");
        assert!(opts.validate().is_err());

        let mut opts = options(checkout.path());
        opts.branches = None;
        opts.min_milestone = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_commit_message_format() {
        assert_eq!(
            commit_message("release-R90-13816.B"),
            "Repair local_manifest.xml for branch release-R90-13816.B\n\nThis CL was created by the Manifest Doctor.\n"
        );
    }
}
