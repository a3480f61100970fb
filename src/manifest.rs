//! # Manifest Model
//!
//! This module defines the data structures that represent a repo manifest
//! XML document, as well as parsing, serialization, include merging, and
//! branch-mode classification.
//!
//! ## Key Components
//!
//! - **`Manifest`**: the top-level document: an optional `<default>` record,
//!   a set of `<remote>`s keyed by name, an ordered sequence of `<project>`s
//!   (uniquely identified by `path`), and `<include>` references to sibling
//!   manifest files.
//! - **`BranchMode`**: the derived branching policy of a project (`create`,
//!   `pinned`, `tot`, or `unspecified`). It is never stored in the manifest;
//!   it is computed from the project's `branch-mode` annotation or, failing
//!   that, from its remote.
//! - **`merge_manifests`**: the include fold. Remotes are unioned by name,
//!   the root's default wins, projects are appended in document order and
//!   `path` collisions keep the last occurrence.
//!
//! ## Parsing and Serialization
//!
//! Parsing is tolerant: unknown attributes and unknown elements are ignored
//! by the model (the minimal-diff rewriter in `rewrite` preserves them
//! textually, so nothing is lost on disk). Serialization writes projects with
//! the fixed attribute order `path, name, revision, upstream, remote,
//! groups, sync-c` and omits the `<default>` element entirely when the
//! record is empty.

use std::collections::HashMap;

use regex::Regex;
use xot::Xot;

use crate::error::{Error, Result};

/// The `<default>` record of a manifest. At most one per manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaults {
    /// Default remote name applied to projects without an explicit remote.
    pub remote_name: String,
    /// Default revision applied to projects without an explicit revision.
    pub revision: String,
    /// Default sync parallelism (`sync-j`).
    pub sync_j: String,
}

impl Defaults {
    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        self.remote_name.is_empty() && self.revision.is_empty() && self.sync_j.is_empty()
    }
}

/// A `<remote>` element. Remotes are unique by `name` within a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub fetch: String,
    pub revision: String,
    pub alias: String,
    pub annotations: Vec<Annotation>,
}

impl Remote {
    /// The git name of the remote: `alias` if set, `name` otherwise.
    pub fn git_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }

    /// Value of the annotation with the given name, if present.
    pub fn annotation(&self, name: &str) -> Option<&str> {
        annotation_value(&self.annotations, name)
    }
}

/// A `<project>` element.
///
/// A project is uniquely identified by `path` within a manifest; the same
/// `name` may appear multiple times at different paths ("multi-checkout").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub path: String,
    pub revision: String,
    pub upstream: String,
    pub remote_name: String,
    pub groups: String,
    pub sync_c: String,
    pub annotations: Vec<Annotation>,
}

impl Project {
    /// Value of the annotation with the given name, if present.
    pub fn annotation(&self, name: &str) -> Option<&str> {
        annotation_value(&self.annotations, name)
    }
}

/// An `<annotation name=… value=…/>` child of a project or remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

/// An `<include name=…/>` reference to a sibling manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Include {
    pub name: String,
}

/// A `<repo-hooks>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoHooks {
    pub enabled_list: String,
    pub in_project: String,
}

/// A top-level repo manifest definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub includes: Vec<Include>,
    pub remotes: Vec<Remote>,
    pub defaults: Defaults,
    pub notice: String,
    pub repo_hooks: Vec<RepoHooks>,
    pub projects: Vec<Project>,
}

/// A project's branching policy at branch-cut time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchMode {
    /// A new branch ref is created for the project on cut.
    Create,
    /// The ref remains fixed at a specific revision; no branch ref is made.
    Pinned,
    /// The project always follows the trunk ref of its remote.
    Tot,
    /// No decision could be derived; operations that need one must reject.
    Unspecified,
}

impl std::fmt::Display for BranchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BranchMode::Create => "create",
            BranchMode::Pinned => "pinned",
            BranchMode::Tot => "tot",
            BranchMode::Unspecified => "unspecified",
        };
        write!(f, "{}", s)
    }
}

fn annotation_value<'a>(annotations: &'a [Annotation], name: &str) -> Option<&'a str> {
    annotations
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

/// Remote git names whose projects may be branched, mapped to the project
/// name pattern that qualifies.
fn branchable_project_pattern(remote_git_name: &str) -> Option<&'static str> {
    match remote_git_name {
        "cros" => Some(r"^(chromiumos|aosp)/(.+)"),
        "cros-internal" => Some(r"^chromeos/(.+)"),
        _ => None,
    }
}

impl Manifest {
    /// Parse a manifest document from text.
    ///
    /// `origin` labels the document in error messages (a file path or URL).
    /// Rejects malformed XML; tolerates unknown attributes and elements.
    pub fn parse(text: &str, origin: &str) -> Result<Manifest> {
        let mut xot = Xot::new();
        let doc = xot.parse(text).map_err(|e| Error::ManifestParse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        let root = xot.document_element(doc).map_err(|e| Error::ManifestParse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        let root_name = match xot.element(root) {
            Some(el) => xot.name_ns_str(el.name()).0.to_string(),
            None => String::new(),
        };
        if root_name != "manifest" {
            return Err(Error::ManifestParse {
                path: origin.to_string(),
                message: format!("root element is <{}>, expected <manifest>", root_name),
            });
        }

        let mut manifest = Manifest::default();
        for child in xot.children(root) {
            let el = match xot.element(child) {
                Some(el) => el,
                None => continue,
            };
            match xot.name_ns_str(el.name()).0 {
                "default" => {
                    manifest.defaults = Defaults {
                        remote_name: attr(&xot, child, "remote"),
                        revision: attr(&xot, child, "revision"),
                        sync_j: attr(&xot, child, "sync-j"),
                    };
                }
                "remote" => {
                    manifest.remotes.push(Remote {
                        name: attr(&xot, child, "name"),
                        fetch: attr(&xot, child, "fetch"),
                        revision: attr(&xot, child, "revision"),
                        alias: attr(&xot, child, "alias"),
                        annotations: annotations(&xot, child),
                    });
                }
                "project" => {
                    manifest.projects.push(Project {
                        name: attr(&xot, child, "name"),
                        path: attr(&xot, child, "path"),
                        revision: attr(&xot, child, "revision"),
                        upstream: attr(&xot, child, "upstream"),
                        remote_name: attr(&xot, child, "remote"),
                        groups: attr(&xot, child, "groups"),
                        sync_c: attr(&xot, child, "sync-c"),
                        annotations: annotations(&xot, child),
                    });
                }
                "include" => {
                    manifest.includes.push(Include {
                        name: attr(&xot, child, "name"),
                    });
                }
                "repo-hooks" => {
                    manifest.repo_hooks.push(RepoHooks {
                        enabled_list: attr(&xot, child, "enabled-list"),
                        in_project: attr(&xot, child, "in-project"),
                    });
                }
                "notice" => {
                    manifest.notice = text_content(&xot, child);
                }
                // Unknown elements are preserved on disk by the rewriter;
                // the model does not track them.
                _ => {}
            }
        }
        Ok(manifest)
    }

    /// Serialize the manifest.
    ///
    /// Projects are written with the attribute order `path, name, revision,
    /// upstream, remote, groups, sync-c`. An empty default record produces
    /// no `<default>` element.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<manifest>\n");
        for include in &self.includes {
            out.push_str("  <include");
            push_attr(&mut out, "name", &include.name);
            out.push_str("/>\n");
        }
        for remote in &self.remotes {
            out.push_str("  <remote");
            push_attr(&mut out, "fetch", &remote.fetch);
            push_attr(&mut out, "name", &remote.name);
            push_attr(&mut out, "revision", &remote.revision);
            push_attr(&mut out, "alias", &remote.alias);
            push_annotations(&mut out, "remote", &remote.annotations);
        }
        if !self.defaults.is_empty() {
            out.push_str("  <default");
            push_attr(&mut out, "remote", &self.defaults.remote_name);
            push_attr(&mut out, "revision", &self.defaults.revision);
            push_attr(&mut out, "sync-j", &self.defaults.sync_j);
            out.push_str("/>\n");
        }
        if !self.notice.is_empty() {
            out.push_str("  <notice>");
            out.push_str(&escape_xml(&self.notice));
            out.push_str("</notice>\n");
        }
        for hooks in &self.repo_hooks {
            out.push_str("  <repo-hooks");
            push_attr(&mut out, "enabled-list", &hooks.enabled_list);
            push_attr(&mut out, "in-project", &hooks.in_project);
            out.push_str("/>\n");
        }
        for project in &self.projects {
            out.push_str("  <project");
            push_attr(&mut out, "path", &project.path);
            push_attr(&mut out, "name", &project.name);
            push_attr(&mut out, "revision", &project.revision);
            push_attr(&mut out, "upstream", &project.upstream);
            push_attr(&mut out, "remote", &project.remote_name);
            push_attr(&mut out, "groups", &project.groups);
            push_attr(&mut out, "sync-c", &project.sync_c);
            push_annotations(&mut out, "project", &project.annotations);
        }
        out.push_str("</manifest>\n");
        out
    }

    /// Explicitly set remote/revision information for each project from the
    /// default record ("implicit links").
    ///
    /// A project without a remote gets the default remote; a project without
    /// a revision gets its remote's revision or, failing that, the default
    /// revision. A project without a path gets its name as path.
    pub fn resolve_implicit_links(&self) -> Manifest {
        let mut resolved = self.clone();
        for project in &mut resolved.projects {
            if project.remote_name.is_empty() {
                project.remote_name = self.defaults.remote_name.clone();
            }
            if project.revision.is_empty() {
                match self.remote_by_name(&project.remote_name) {
                    Some(remote) if !remote.revision.is_empty() => {
                        project.revision = remote.revision.clone();
                    }
                    _ => project.revision = self.defaults.revision.clone(),
                }
            }
            if project.path.is_empty() {
                project.path = project.name.clone();
            }
        }
        resolved
    }

    /// The remote with the given name, if any.
    pub fn remote_by_name(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    /// The project at the given path, if any. `path` is the unique project
    /// identifier within one manifest.
    pub fn project_by_path(&self, path: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.path == path)
    }

    /// All projects with the given name (a multi-checkout project appears
    /// once per checkout path).
    pub fn projects_by_name(&self, name: &str) -> Vec<&Project> {
        self.projects.iter().filter(|p| p.name == name).collect()
    }

    /// The unique project with the given name. Errors when zero or several
    /// projects carry it.
    pub fn unique_project(&self, name: &str) -> Result<&Project> {
        let matches = self.projects_by_name(name);
        match matches.len() {
            0 => Err(Error::ManifestParse {
                path: name.to_string(),
                message: format!("no project named {}", name),
            }),
            1 => Ok(matches[0]),
            n => Err(Error::ManifestParse {
                path: name.to_string(),
                message: format!("{} projects named {}", n, name),
            }),
        }
    }

    /// All projects classified under the given branch mode.
    pub fn projects_by_branch_mode(&self, mode: BranchMode) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| self.branch_mode(p) == mode)
            .collect()
    }

    /// The branch mode of a project.
    ///
    /// A `branch-mode` annotation on the project wins; otherwise the mode is
    /// derived from the project's remote (branchable remotes are enumerated
    /// explicitly); otherwise the project is pinned. Recomputing for the same
    /// project always returns the identical value.
    pub fn branch_mode(&self, project: &Project) -> BranchMode {
        if let Some(explicit) = project.annotation("branch-mode") {
            return match explicit {
                "create" => BranchMode::Create,
                "pin" => BranchMode::Pinned,
                "tot" => BranchMode::Tot,
                _ => BranchMode::Unspecified,
            };
        }

        let remote = match self.remote_by_name(&project.remote_name) {
            Some(remote) => remote,
            None => return BranchMode::Unspecified,
        };
        if let Some(pattern) = branchable_project_pattern(remote.git_name()) {
            let matches = Regex::new(pattern)
                .map(|re| re.is_match(&project.name))
                .unwrap_or(false);
            if matches {
                return BranchMode::Create;
            }
        }
        BranchMode::Pinned
    }
}

/// Merge the given manifests based on includes, taking `manifests[root]` to
/// be the top-level manifest.
///
/// The fold rule: remotes are unioned by `name` (first occurrence wins), the
/// root's `default` wins, projects are appended in the order (root's
/// projects, then each include's projects in order) and `path` collisions
/// keep the last occurrence. Includes are cleared and implicit links are
/// resolved on the result. Cyclic includes abort.
pub fn merge_manifests(root: &str, manifests: &HashMap<String, Manifest>) -> Result<Manifest> {
    let mut stack = Vec::new();
    let merged = merge_recursive(root, manifests, &mut stack)?;
    for project in &merged.projects {
        if !project.remote_name.is_empty() && merged.remote_by_name(&project.remote_name).is_none()
        {
            return Err(Error::UnknownRemote {
                remote: project.remote_name.clone(),
                project: project.name.clone(),
            });
        }
    }
    Ok(merged)
}

fn merge_recursive(
    root: &str,
    manifests: &HashMap<String, Manifest>,
    stack: &mut Vec<String>,
) -> Result<Manifest> {
    if stack.iter().any(|name| name == root) {
        return Err(Error::CyclicInclude {
            path: root.to_string(),
        });
    }
    stack.push(root.to_string());

    let mut base = manifests
        .get(root)
        .ok_or_else(|| Error::ManifestParse {
            path: root.to_string(),
            message: "manifest does not exist".to_string(),
        })?
        .clone();

    for include in std::mem::take(&mut base.includes) {
        let merged = merge_recursive(&include.name, manifests, stack)?;
        for project in merged.projects {
            match base.projects.iter_mut().find(|p| p.path == project.path) {
                // Later duplicates of a path replace earlier ones.
                Some(existing) => *existing = project,
                None => base.projects.push(project),
            }
        }
        for remote in merged.remotes {
            if base.remote_by_name(&remote.name).is_none() {
                base.remotes.push(remote);
            }
        }
        // The base manifest's default wins.
    }

    stack.pop();
    Ok(base.resolve_implicit_links())
}

fn attr(xot: &Xot, node: xot::Node, name: &str) -> String {
    xot.attributes(node)
        .iter()
        .find_map(|(name_id, value)| {
            if xot.name_ns_str(name_id).0 == name {
                Some(value.to_string())
            } else {
                None
            }
        })
        .unwrap_or_default()
}

fn annotations(xot: &Xot, node: xot::Node) -> Vec<Annotation> {
    let mut result = Vec::new();
    for child in xot.children(node) {
        if let Some(el) = xot.element(child) {
            if xot.name_ns_str(el.name()).0 == "annotation" {
                result.push(Annotation {
                    name: attr(xot, child, "name"),
                    value: attr(xot, child, "value"),
                });
            }
        }
    }
    result
}

fn text_content(xot: &Xot, node: xot::Node) -> String {
    let mut result = String::new();
    for child in xot.children(node) {
        if let Some(text) = xot.text(child) {
            result.push_str(text.get());
        }
    }
    result.trim().to_string()
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_xml(value));
    out.push('"');
}

fn push_annotations(out: &mut String, tag: &str, annotations: &[Annotation]) {
    if annotations.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for annotation in annotations {
        out.push_str("    <annotation");
        push_attr(out, "name", &annotation.name);
        push_attr(out, "value", &annotation.value);
        out.push_str("/>\n");
    }
    out.push_str("  </");
    out.push_str(tag);
    out.push_str(">\n");
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
