//! # Git Operations
//!
//! Thin wrappers over the system `git` binary. Using the system command,
//! rather than a bound library, automatically honors SSH keys, credential
//! helpers and any authentication configured in `~/.gitconfig` — the same
//! environment release engineers run the tool in.
//!
//! The [`GitOps`] trait fronts every operation the commit/push driver needs,
//! so tests can substitute a mock while production code uses [`SystemGit`].

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// stdout/stderr of a finished git command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A remote ref to push to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub remote: String,
    pub ref_name: String,
}

/// Run a git command in the given repository, returning stdout/stderr.
pub fn run_git(repo: &Path, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            repo: repo.display().to_string(),
            stderr: e.to_string(),
        })?;
    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            repo: repo.display().to_string(),
            stderr: if result.stderr.is_empty() {
                result.stdout.clone()
            } else {
                result.stderr.clone()
            },
        });
    }
    Ok(result)
}

/// Remove a leading `refs/heads/` from a ref name.
pub fn strip_refs_head(ref_name: &str) -> &str {
    ref_name.strip_prefix("refs/heads/").unwrap_or(ref_name)
}

/// Remove leading `refs/heads/` or `refs/remotes/<remote>/` from a ref name.
pub fn strip_refs(ref_name: &str) -> &str {
    let stripped = strip_refs_head(ref_name);
    if let Some(rest) = stripped.strip_prefix("refs/remotes/") {
        // refs/remotes/origin/foo/bar -> foo/bar
        match rest.split_once('/') {
            Some((_, branch)) => branch,
            None => rest,
        }
    } else {
        stripped
    }
}

/// Convert a git branch name into fully qualified `refs/heads/` form.
pub fn normalize_ref(ref_name: &str) -> String {
    if ref_name.is_empty() || ref_name.starts_with("refs/") {
        ref_name.to_string()
    } else {
        format!("refs/heads/{}", ref_name)
    }
}

/// Whether the given ref is a full commit SHA.
pub fn is_sha(ref_name: &str) -> bool {
    ref_name.len() == 40 && ref_name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Classify a failed push: transient transport trouble is retried, definite
/// rejections fail fast.
pub fn classify_push_error(project: &str, branch: &str, stderr: &str) -> Error {
    let lowered = stderr.to_lowercase();
    let transient = [
        "could not resolve host",
        "connection reset",
        "connection refused",
        "connection timed out",
        "operation timed out",
        "early eof",
        "remote end hung up",
        "temporarily unavailable",
        "internal server error",
        "503",
        "502",
        "500",
    ];
    if transient.iter().any(|marker| lowered.contains(marker)) {
        return Error::Transient {
            operation: format!("push to {} for {}", branch, project),
            message: stderr.to_string(),
        };
    }
    Error::PushRejected {
        project: project.to_string(),
        branch: branch.to_string(),
        stderr: stderr.to_string(),
    }
}

/// The git operations consumed by the commit/push driver.
pub trait GitOps: Send + Sync {
    /// Whether `branch` exists on `remote` (via ls-remote; no fetch).
    fn remote_has_branch(&self, repo: &Path, remote: &str, branch: &str) -> Result<bool>;

    /// Fetch `refspec` from `remote`.
    fn fetch(&self, repo: &Path, remote: &str, refspec: &str) -> Result<()>;

    /// Check out a branch.
    fn checkout(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Add all local changes and commit them. Returns the commit SHA.
    fn commit_all(&self, repo: &Path, message: &str) -> Result<String>;

    /// The configured remotes of a repository.
    fn get_remotes(&self, repo: &Path) -> Result<Vec<String>>;

    /// Push `local_ref` to the given remote ref, optionally as a dry run.
    fn push_ref(&self, repo: &Path, local_ref: &str, remote_ref: &RemoteRef, dry_run: bool)
        -> Result<()>;

    /// The SHA of HEAD.
    fn rev_parse_head(&self, repo: &Path) -> Result<String>;

    /// All refs advertised by `remote`.
    fn ls_remote_refs(&self, repo: &Path, remote: &str) -> Result<Vec<String>>;
}

/// [`GitOps`] implementation backed by the system `git` binary.
#[derive(Debug, Clone, Default)]
pub struct SystemGit;

impl GitOps for SystemGit {
    fn remote_has_branch(&self, repo: &Path, remote: &str, branch: &str) -> Result<bool> {
        let output = run_git(repo, &["ls-remote", remote, branch])?;
        Ok(!output.stdout.trim().is_empty())
    }

    fn fetch(&self, repo: &Path, remote: &str, refspec: &str) -> Result<()> {
        run_git(repo, &["fetch", remote, refspec])?;
        Ok(())
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        run_git(repo, &["checkout", branch])?;
        Ok(())
    }

    fn commit_all(&self, repo: &Path, message: &str) -> Result<String> {
        run_git(repo, &["add", "-A"])?;
        run_git(repo, &["commit", "-m", message])?;
        self.rev_parse_head(repo)
    }

    fn get_remotes(&self, repo: &Path) -> Result<Vec<String>> {
        let output = run_git(repo, &["remote"])?;
        Ok(output
            .stdout
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    fn push_ref(
        &self,
        repo: &Path,
        local_ref: &str,
        remote_ref: &RemoteRef,
        dry_run: bool,
    ) -> Result<()> {
        let refspec = format!("{}:{}", local_ref, remote_ref.ref_name);
        let mut args = vec!["push", remote_ref.remote.as_str(), refspec.as_str()];
        if dry_run {
            args.push("--dry-run");
        }
        run_git(repo, &args).map_err(|err| match err {
            Error::GitCommand { stderr, .. } => {
                classify_push_error(&repo.display().to_string(), &remote_ref.ref_name, &stderr)
            }
            other => other,
        })?;
        Ok(())
    }

    fn rev_parse_head(&self, repo: &Path) -> Result<String> {
        let output = run_git(repo, &["rev-parse", "HEAD"])?;
        Ok(output.stdout.trim().to_string())
    }

    fn ls_remote_refs(&self, repo: &Path, remote: &str) -> Result<Vec<String>> {
        let output = run_git(repo, &["ls-remote", remote])?;
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(|r| r.to_string())
            .collect())
    }
}
