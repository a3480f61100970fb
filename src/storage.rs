//! # Object Storage Interface
//!
//! The buildspec builder and the public mirror filter publish manifests to
//! per-project buckets. The transport itself is out of scope; this module
//! defines the [`ObjectStore`] trait the core consumes, a `gs://` path type,
//! and a local-directory backend used by tests and local runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use url::Url;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A `gs://bucket/object` location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GsPath {
    pub bucket: String,
    pub object: String,
}

impl GsPath {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        GsPath {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Parse a `gs://bucket/object` URL.
    pub fn parse(uri: &str) -> Result<GsPath> {
        let url = Url::parse(uri)?;
        if url.scheme() != "gs" {
            return Err(Error::Storage {
                path: uri.to_string(),
                message: format!("expected gs:// scheme, got {}://", url.scheme()),
            });
        }
        let bucket = url.host_str().unwrap_or_default().to_string();
        if bucket.is_empty() {
            return Err(Error::Storage {
                path: uri.to_string(),
                message: "missing bucket name".to_string(),
            });
        }
        Ok(GsPath {
            bucket,
            object: url.path().trim_start_matches('/').to_string(),
        })
    }
}

impl fmt::Display for GsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

/// The object-storage operations consumed by the buildspec and mirror
/// pipelines. A single instance is shared across workers; implementations
/// must be thread-safe.
pub trait ObjectStore: Send + Sync {
    /// Read an object's contents.
    fn read(&self, path: &GsPath) -> Result<Vec<u8>>;

    /// Write an object, replacing any previous contents.
    fn write(&self, path: &GsPath, data: &[u8]) -> Result<()>;

    /// List object names under a prefix within a bucket.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Attach a time-to-live to an object.
    fn set_ttl(&self, path: &GsPath, ttl: Duration) -> Result<()>;

    /// Whether an object exists.
    fn exists(&self, path: &GsPath) -> Result<bool> {
        Ok(self
            .list(&path.bucket, &path.object)?
            .iter()
            .any(|o| o == &path.object))
    }
}

/// TTL metadata sidecar suffix used by [`LocalStore`].
const TTL_SUFFIX: &str = ".ttl";

/// An [`ObjectStore`] rooted in a local directory: `gs://bucket/object`
/// maps to `<root>/bucket/object`. TTLs are recorded in sidecar files.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    fn object_path(&self, path: &GsPath) -> PathBuf {
        self.root.join(&path.bucket).join(&path.object)
    }
}

impl ObjectStore for LocalStore {
    fn read(&self, path: &GsPath) -> Result<Vec<u8>> {
        std::fs::read(self.object_path(path)).map_err(|e| Error::Storage {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn write(&self, path: &GsPath, data: &[u8]) -> Result<()> {
        let full = self.object_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(&full, data).map_err(|e| Error::Storage {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_root = self.root.join(bucket);
        if !bucket_root.exists() {
            return Ok(Vec::new());
        }
        let mut objects = Vec::new();
        for entry in WalkDir::new(&bucket_root) {
            let entry = entry.map_err(|e| Error::Storage {
                path: format!("gs://{}/{}", bucket, prefix),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&bucket_root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            if relative.ends_with(TTL_SUFFIX) {
                continue;
            }
            if relative.starts_with(prefix) {
                objects.push(relative);
            }
        }
        objects.sort();
        Ok(objects)
    }

    fn set_ttl(&self, path: &GsPath, ttl: Duration) -> Result<()> {
        let sidecar = GsPath::new(&path.bucket, format!("{}{}", path.object, TTL_SUFFIX));
        self.write(&sidecar, ttl.as_secs().to_string().as_bytes())
    }
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A per-invocation scratch directory, removed on drop so that cleanup is
/// guaranteed on all exit paths.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh scratch directory under the system temp dir.
    pub fn new(label: &str) -> Result<ScratchDir> {
        let serial = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "manifest-doctor-{}-{}-{}",
            label,
            std::process::id(),
            serial
        ));
        std::fs::create_dir_all(&path)?;
        Ok(ScratchDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
