//! # Run Configuration
//!
//! The `branch` command reads its run configuration from a YAML file
//! (`.manifest-doctor.yaml` by convention), with every field overridable
//! from the command line. The file is the convenient place to keep the
//! long-lived part of a deployment: the checkout location, the project
//! list, and the milestone window.
//!
//! ```yaml
//! checkout: ~/chromiumos
//! projects:
//!   - chromeos/project/galaxy/milkyway
//!   - chromeos/program/galaxy
//! min_milestone: 90
//! remote: cros-internal
//! concurrency: 8
//! deadline_minutes: 60
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::repair::RepairOptions;

fn default_remote() -> String {
    "cros-internal".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_deadline_minutes() -> u64 {
    60
}

/// Declarative configuration for the repair batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorConfig {
    /// Path to the full checkout containing manifest-internal.
    pub checkout: PathBuf,

    /// Project paths (relative to the checkout) whose `local_manifest.xml`
    /// is kept in lock-step.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Minimum milestone of release branches to consider.
    #[serde(default)]
    pub min_milestone: u32,

    /// Milestone currently on trunk; enables processing `main`.
    #[serde(default)]
    pub trunk_milestone: Option<u32>,

    /// Explicit branch list; short-circuits derivation when present.
    #[serde(default)]
    pub branches: Option<Vec<String>>,

    /// Git remote used to probe and fetch project branches.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Worker pool size for projects within a branch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Root directory of the memoization store. Defaults to the user cache
    /// directory.
    #[serde(default)]
    pub memo_root: Option<PathBuf>,

    /// Overall batch deadline, in minutes. Zero disables the deadline.
    #[serde(default = "default_deadline_minutes")]
    pub deadline_minutes: u64,

    /// Whether to push for real. Off by default: dry runs are cheap and
    /// this tool writes to release branches.
    #[serde(default)]
    pub push: bool,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        DoctorConfig {
            checkout: PathBuf::new(),
            projects: Vec::new(),
            min_milestone: 0,
            trunk_milestone: None,
            branches: None,
            remote: default_remote(),
            concurrency: default_concurrency(),
            memo_root: None,
            deadline_minutes: default_deadline_minutes(),
            push: false,
        }
    }
}

/// Parse a YAML configuration document.
pub fn parse(yaml: &str) -> Result<DoctorConfig> {
    let config: DoctorConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Load a configuration file.
pub fn from_file(path: &Path) -> Result<DoctorConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("failed to read {}: {}", path.display(), e),
        hint: None,
    })?;
    parse(&text)
}

impl DoctorConfig {
    /// Check the fields no batch can run without.
    pub fn validate(&self) -> Result<()> {
        if self.checkout.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "a checkout path is required".to_string(),
                hint: Some("set `checkout:` in the config or pass --checkout".to_string()),
            });
        }
        if self.projects.is_empty() {
            return Err(Error::Config {
                message: "at least one project is required".to_string(),
                hint: Some("set `projects:` in the config or pass --projects".to_string()),
            });
        }
        if self.min_milestone == 0 && self.branches.is_none() {
            return Err(Error::Config {
                message: "a minimum milestone is required".to_string(),
                hint: Some("set `min_milestone:` or an explicit `branches:` list".to_string()),
            });
        }
        Ok(())
    }

    /// Lower the configuration into batch options, anchoring the deadline
    /// at "now".
    pub fn repair_options(&self) -> RepairOptions {
        let deadline = if self.deadline_minutes == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(self.deadline_minutes * 60))
        };
        RepairOptions {
            checkout: self.checkout.clone(),
            projects: self.projects.clone(),
            min_milestone: self.min_milestone,
            trunk_milestone: self.trunk_milestone,
            branches: self.branches.clone(),
            remote: self.remote.clone(),
            dry_run: !self.push,
            concurrency: self.concurrency.max(1),
            deadline,
        }
    }

    /// The memoization store root: the configured one, or the default
    /// under the user cache directory.
    pub fn memo_root(&self) -> PathBuf {
        self.memo_root
            .clone()
            .unwrap_or_else(crate::memo::JsonFileStore::default_root)
    }
}
