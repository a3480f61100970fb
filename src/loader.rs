//! # Reference Fetcher
//!
//! Loads manifest documents (and their includes) from three kinds of
//! sources behind one interface:
//!
//! - a local directory (e.g. a manifest-internal checkout),
//! - a gitiles-like API (`download_file` at `(host, project, committish)`),
//! - an object-storage bucket.
//!
//! All sources follow *symlink-style* manifests: a file whose entire content
//! is a single `*.xml` filename is a redirect to the sibling of that name,
//! resolved at most [`MAX_SYMLINK_DEPTH`] times (rotating snapshots are
//! published this way).
//!
//! Include resolution is depth-limited recursion with a visited set keyed by
//! the *resolved* path, not the include name, so that siblings with the same
//! relative name in different locations do not collide.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::manifest::{self, Manifest};
use crate::storage::{GsPath, ObjectStore};

/// Bound on chained symlink-style manifests.
pub const MAX_SYMLINK_DEPTH: usize = 4;

/// The gitiles-like operations consumed by the loader, the branch
/// enumerator and the buildspec builder. A shared instance must be
/// thread-safe; real transports live outside this crate.
pub trait Gitiles: Send + Sync {
    /// Download a file, or `None` when the path does not exist at the
    /// committish (a 404-equivalent).
    fn download_file(
        &self,
        host: &str,
        project: &str,
        committish: &str,
        path: &str,
    ) -> Result<Option<String>>;

    /// Map of `refs/heads/...` ref names to revisions for a project.
    fn list_refs(&self, host: &str, project: &str) -> Result<HashMap<String, String>>;

    /// File and directory names directly under `path` at the committish.
    fn list_files(
        &self,
        host: &str,
        project: &str,
        committish: &str,
        path: &str,
    ) -> Result<Vec<String>>;

    /// All project names on a host.
    fn list_projects(&self, host: &str) -> Result<Vec<String>>;
}

/// A source of manifest files addressed by source-relative names.
pub trait FileSource {
    /// Read a file, or `None` when it does not exist.
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Human-readable location of a file, for error messages.
    fn describe(&self, name: &str) -> String;
}

/// Manifest files in a local directory.
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalSource { root: root.into() }
    }
}

impl FileSource for LocalSource {
    fn read(&self, name: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.root.join(name)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }
}

/// Manifest files in a repository served by a gitiles-like API.
pub struct GitilesSource<'a> {
    gitiles: &'a dyn Gitiles,
    host: String,
    project: String,
    committish: String,
}

impl<'a> GitilesSource<'a> {
    pub fn new(gitiles: &'a dyn Gitiles, host: &str, project: &str, committish: &str) -> Self {
        GitilesSource {
            gitiles,
            host: host.to_string(),
            project: project.to_string(),
            committish: committish.to_string(),
        }
    }
}

impl FileSource for GitilesSource<'_> {
    fn read(&self, name: &str) -> Result<Option<String>> {
        self.gitiles
            .download_file(&self.host, &self.project, &self.committish, name)
    }

    fn describe(&self, name: &str) -> String {
        format!(
            "{}/{}/{} at {}",
            self.host, self.project, name, self.committish
        )
    }
}

/// Manifest objects under a bucket prefix.
pub struct StorageSource<'a> {
    store: &'a dyn ObjectStore,
    bucket: String,
    prefix: String,
}

impl<'a> StorageSource<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &str, prefix: &str) -> Self {
        StorageSource {
            store,
            bucket: bucket.to_string(),
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn object_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl FileSource for StorageSource<'_> {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = GsPath::new(&self.bucket, self.object_name(name));
        if !self.store.exists(&path)? {
            return Ok(None);
        }
        let bytes = self.store.read(&path)?;
        String::from_utf8(bytes).map(Some).map_err(|e| Error::Storage {
            path: path.to_string(),
            message: format!("not valid UTF-8: {}", e),
        })
    }

    fn describe(&self, name: &str) -> String {
        GsPath::new(&self.bucket, self.object_name(name)).to_string()
    }
}

/// A [`Gitiles`] implementation backed by a directory tree, for local runs
/// and tests. Real transports are wired in by the enclosing deployment.
///
/// Layout: `<root>/<project>/<committish>/<path>`, with the committish kept
/// as a literal sub-path (`refs/heads/main` is three directories). Refs are
/// enumerated from the directories under `<project>/refs/heads/`; projects
/// are the directories that contain a `HEAD` or `refs` entry.
#[derive(Debug, Clone)]
pub struct DirGitiles {
    root: PathBuf,
}

impl DirGitiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirGitiles { root: root.into() }
    }
}

impl Gitiles for DirGitiles {
    fn download_file(
        &self,
        _host: &str,
        project: &str,
        committish: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let file = self.root.join(project).join(committish).join(path);
        match std::fs::read_to_string(&file) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Gitiles {
                host: "local".to_string(),
                project: project.to_string(),
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn list_refs(&self, _host: &str, project: &str) -> Result<HashMap<String, String>> {
        let heads = self.root.join(project).join("refs/heads");
        let mut refs = HashMap::new();
        let entries = match std::fs::read_dir(&heads) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(refs),
            Err(e) => {
                return Err(Error::Gitiles {
                    host: "local".to_string(),
                    project: project.to_string(),
                    path: "refs/heads".to_string(),
                    message: e.to_string(),
                });
            }
        };
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                let name = entry.file_name().to_string_lossy().to_string();
                refs.insert(format!("refs/heads/{}", name), String::new());
            }
        }
        Ok(refs)
    }

    fn list_files(
        &self,
        _host: &str,
        project: &str,
        committish: &str,
        path: &str,
    ) -> Result<Vec<String>> {
        let dir = self.root.join(project).join(committish).join(path);
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(Error::Gitiles {
                    host: "local".to_string(),
                    project: project.to_string(),
                    path: path.to_string(),
                    message: e.to_string(),
                });
            }
        };
        for entry in entries.flatten() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    fn list_projects(&self, _host: &str) -> Result<Vec<String>> {
        let mut projects = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            if path.join("HEAD").exists() || path.join("refs").exists() {
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    projects.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        projects.sort();
        Ok(projects)
    }
}

/// If the content is a symlink-style manifest, its target filename.
pub fn symlink_target(content: &str) -> Option<&str> {
    let re = Regex::new(r"^\S+\.xml\s*$").ok()?;
    if re.is_match(content) {
        Some(content.trim())
    } else {
        None
    }
}

/// Normalize `a/./b/../c` style relative names.
fn normalize_name(name: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolve a name relative to the directory of `base`.
fn sibling(base: &str, name: &str) -> String {
    match base.rsplit_once('/') {
        Some((dir, _)) => normalize_name(&format!("{}/{}", dir, name)),
        None => normalize_name(name),
    }
}

/// Read a file from the source, following symlink-style redirects.
///
/// Returns the content and the resolved name.
fn read_resolving_symlinks(source: &dyn FileSource, name: &str) -> Result<(String, String)> {
    let mut current = normalize_name(name);
    for _ in 0..=MAX_SYMLINK_DEPTH {
        let content = source
            .read(&current)?
            .ok_or_else(|| Error::ManifestParse {
                path: source.describe(&current),
                message: "file not found".to_string(),
            })?;
        match symlink_target(&content) {
            Some(target) => {
                let next = sibling(&current, target);
                debug!("manifest {} redirects to {}", current, next);
                current = next;
            }
            None => return Ok((content, current)),
        }
    }
    Err(Error::ManifestParse {
        path: source.describe(name),
        message: format!("more than {} chained symlink manifests", MAX_SYMLINK_DEPTH),
    })
}

/// Load a single manifest (includes are not resolved).
pub fn load(source: &dyn FileSource, name: &str) -> Result<Manifest> {
    let (content, resolved) = read_resolving_symlinks(source, name)?;
    Manifest::parse(&content, &source.describe(&resolved))
}

/// Load a manifest and every manifest it transitively includes.
///
/// The returned map is keyed by source-relative file name; the root is keyed
/// by `name` (post symlink resolution). Cyclic includes abort.
pub fn load_tree(source: &dyn FileSource, name: &str) -> Result<HashMap<String, Manifest>> {
    let mut results = HashMap::new();
    let mut stack = Vec::new();
    let root_key = load_tree_recursive(source, name, &mut results, &mut stack)?;
    debug_assert!(results.contains_key(&root_key));
    Ok(results)
}

fn load_tree_recursive(
    source: &dyn FileSource,
    name: &str,
    results: &mut HashMap<String, Manifest>,
    stack: &mut Vec<String>,
) -> Result<String> {
    let (content, resolved) = read_resolving_symlinks(source, name)?;
    if results.contains_key(&resolved) {
        return Ok(resolved);
    }
    if stack.contains(&resolved) {
        return Err(Error::CyclicInclude {
            path: source.describe(&resolved),
        });
    }
    stack.push(resolved.clone());

    let mut loaded = Manifest::parse(&content, &source.describe(&resolved))?;
    // Rewrite include names to resolved source-relative keys so that the
    // merge fold finds them regardless of nesting depth.
    for include in &mut loaded.includes {
        let child = sibling(&resolved, &include.name);
        let child_key = load_tree_recursive(source, &child, results, stack)?;
        include.name = child_key;
    }
    results.insert(resolved.clone(), loaded);

    stack.pop();
    Ok(resolved)
}

/// Load a manifest with all includes resolved and folded in.
pub fn load_with_includes(source: &dyn FileSource, name: &str) -> Result<Manifest> {
    let (_, resolved) = read_resolving_symlinks(source, name)?;
    let tree = load_tree(source, name)?;
    manifest::merge_manifests(&resolved, &tree)
}

/// Load the manifest at a local file path.
pub fn load_manifest_from_file(path: &Path) -> Result<Manifest> {
    let (source, name) = local_source_for(path)?;
    load(&source, &name)
}

/// Load the manifest at a local file path, resolving includes.
pub fn load_manifest_from_file_with_includes(path: &Path) -> Result<Manifest> {
    let (source, name) = local_source_for(path)?;
    load_with_includes(&source, &name)
}

fn local_source_for(path: &Path) -> Result<(LocalSource, String)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::ManifestParse {
            path: path.display().to_string(),
            message: "not a file path".to_string(),
        })?;
    Ok((LocalSource::new(dir), name))
}

/// Load a manifest file from a gitiles-like source.
pub fn load_manifest_from_gitiles(
    gitiles: &dyn Gitiles,
    host: &str,
    project: &str,
    committish: &str,
    path: &str,
) -> Result<Manifest> {
    let source = GitilesSource::new(gitiles, host, project, committish);
    load(&source, path)
}

/// Load a manifest file from a gitiles-like source, resolving includes.
pub fn load_manifest_from_gitiles_with_includes(
    gitiles: &dyn Gitiles,
    host: &str,
    project: &str,
    committish: &str,
    path: &str,
) -> Result<Manifest> {
    let source = GitilesSource::new(gitiles, host, project, committish);
    load_with_includes(&source, path)
}

/// Load a manifest object from object storage.
pub fn load_manifest_from_storage(store: &dyn ObjectStore, path: &GsPath) -> Result<Manifest> {
    let (bucket, object) = (&path.bucket, &path.object);
    let (prefix, name) = match object.rsplit_once('/') {
        Some((dir, file)) => (dir, file.to_string()),
        None => ("", object.to_string()),
    };
    let source = StorageSource::new(store, bucket, prefix);
    load(&source, &name)
}
