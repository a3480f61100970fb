//! # Memoization Store
//!
//! Cross-invocation memoization for the local-manifest repair batch. The
//! store maps a branch to a record of `project path -> canonical manifest
//! SHA` pairs: when the canonical manifest for a branch has not changed
//! since a project's last successful pin, the work item is skipped.
//!
//! Missing records are normal (new branches, fresh deployments) and read
//! failures are tolerated: both degrade to "no history", which merely costs
//! a redundant re-run. Writes distinguish create from update because some
//! backends are strict about it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-branch memoization record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchMemo {
    /// Project path -> SHA of the canonical manifest commit that was
    /// current when the project was last successfully processed.
    #[serde(rename = "prevshas", default)]
    pub prev_shas: HashMap<String, String>,
}

/// Key-value store of [`BranchMemo`] records keyed by branch name.
pub trait MemoStore: Send + Sync {
    /// Read the record for a branch. A missing branch yields an empty
    /// record and `exists == false`.
    fn read(&self, branch: &str) -> Result<(BranchMemo, bool)>;

    /// Upsert the record for a branch. `exists` carries whether the read
    /// found a pre-existing record, for backends that distinguish create
    /// from update.
    fn write(&self, branch: &str, memo: &BranchMemo, exists: bool) -> Result<()>;
}

/// Read a branch record, degrading any failure to "no history".
///
/// This is the read policy of the repair batch: a memoization outage must
/// never abort processing.
pub fn read_or_empty(store: &dyn MemoStore, branch: &str) -> (BranchMemo, bool) {
    match store.read(branch) {
        Ok(result) => result,
        Err(err) => {
            warn!(
                "failed to read memoization record for branch {}, attempting all projects: {}",
                branch, err
            );
            (BranchMemo::default(), false)
        }
    }
}

/// A [`MemoStore`] holding one JSON file per branch under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFileStore { root: root.into() }
    }

    /// The default store root under the user cache directory.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("manifest-doctor")
            .join("memo")
    }

    fn record_path(&self, branch: &str) -> PathBuf {
        // Branch names may contain '/', which is not filesystem-safe.
        self.root.join(format!("{}.json", branch.replace('/', "-")))
    }
}

impl MemoStore for JsonFileStore {
    fn read(&self, branch: &str) -> Result<(BranchMemo, bool)> {
        let path = self.record_path(branch);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((BranchMemo::default(), false));
            }
            Err(e) => {
                return Err(Error::Memo {
                    message: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };
        let memo = serde_json::from_str(&data).map_err(|e| Error::Memo {
            message: format!("failed to parse {}: {}", path.display(), e),
        })?;
        Ok((memo, true))
    }

    fn write(&self, branch: &str, memo: &BranchMemo, _exists: bool) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| Error::Memo {
            message: format!("failed to create {}: {}", self.root.display(), e),
        })?;
        let path = self.record_path(branch);
        let data = serde_json::to_string_pretty(memo)?;
        // Write through a temp file so a crash never leaves a torn record.
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, data).map_err(|e| Error::Memo {
            message: format!("failed to write {}: {}", temp.display(), e),
        })?;
        std::fs::rename(&temp, &path).map_err(|e| Error::Memo {
            message: format!("failed to replace {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}

/// An in-memory [`MemoStore`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, BranchMemo>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the record for a branch, if any.
    pub fn get(&self, branch: &str) -> Option<BranchMemo> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(branch).cloned())
    }
}

impl MemoStore for InMemoryStore {
    fn read(&self, branch: &str) -> Result<(BranchMemo, bool)> {
        let records = self.records.lock().map_err(|_| Error::Memo {
            message: "memo store lock poisoned".to_string(),
        })?;
        match records.get(branch) {
            Some(memo) => Ok((memo.clone(), true)),
            None => Ok((BranchMemo::default(), false)),
        }
    }

    fn write(&self, branch: &str, memo: &BranchMemo, _exists: bool) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| Error::Memo {
            message: "memo store lock poisoned".to_string(),
        })?;
        records.insert(branch.to_string(), memo.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_reads_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        let (memo, exists) = store.read("release-R93-13816.B").unwrap();
        assert!(memo.prev_shas.is_empty());
        assert!(!exists);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        let mut memo = BranchMemo::default();
        memo.prev_shas
            .insert("chromeos/project/foo".to_string(), "deadbeef".to_string());

        store.write("release-R93-13816.B", &memo, false).unwrap();
        let (read_back, exists) = store.read("release-R93-13816.B").unwrap();
        assert!(exists);
        assert_eq!(read_back, memo);
    }

    #[test]
    fn test_branch_names_with_slashes() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        let memo = BranchMemo::default();
        store.write("feature/some-branch", &memo, false).unwrap();
        let (_, exists) = store.read("feature/some-branch").unwrap();
        assert!(exists);
    }

    #[test]
    fn test_corrupt_record_is_error() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        std::fs::write(temp.path().join("main.json"), "not json").unwrap();
        assert!(store.read("main").is_err());
    }

    #[test]
    fn test_read_or_empty_swallows_errors() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        std::fs::write(temp.path().join("main.json"), "not json").unwrap();
        let (memo, exists) = read_or_empty(&store, "main");
        assert!(memo.prev_shas.is_empty());
        assert!(!exists);
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();
        let (memo, exists) = store.read("main").unwrap();
        assert!(!exists);
        assert!(memo.prev_shas.is_empty());

        let mut memo = BranchMemo::default();
        memo.prev_shas.insert("p".to_string(), "sha".to_string());
        store.write("main", &memo, false).unwrap();
        assert_eq!(store.get("main").unwrap(), memo);
    }

    #[test]
    fn test_record_format_field_name() {
        // The serialized field name is part of the record format shared with
        // other tooling.
        let mut memo = BranchMemo::default();
        memo.prev_shas.insert("p".to_string(), "sha".to_string());
        let json = serde_json::to_string(&memo).unwrap();
        assert!(json.contains("\"prevshas\""));
    }
}
