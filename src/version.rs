//! # Buildspec Version Parsing
//!
//! Buildspec paths in the manifest-versions repository have the shape
//! `{full/,}buildspecs/<milestone>/<build>.0.0[-rcN].xml`, e.g.
//! `full/buildspecs/93/13811.0.0-rc2.xml`. The version triple (with its
//! optional release-candidate pre-release tag) parses cleanly as a semantic
//! version, which gives us ordering for free: `13811.0.0-rc2 < 13811.0.0`.

use regex::Regex;
use semver::Version;

use crate::error::{Error, Result};

const BUILDSPEC_PATH_PATTERN: &str =
    r"^(full/)?buildspecs/(\d+)/(\d+\.\d+\.\d+(?:-rc\d+)?)\.xml$";

/// A parsed buildspec path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildspecPath {
    /// The path as given, e.g. `full/buildspecs/93/13811.0.0-rc2.xml`.
    pub path: String,
    /// Milestone directory component.
    pub milestone: u32,
    /// Version-stamped file name, e.g. `13811.0.0-rc2`.
    pub version: Version,
    /// Whether the buildspec lives under the `full/` prefix.
    pub full: bool,
}

impl BuildspecPath {
    /// Parse a relative buildspec path.
    pub fn parse(path: &str) -> Result<BuildspecPath> {
        let re = Regex::new(BUILDSPEC_PATH_PATTERN)?;
        let captures = re.captures(path).ok_or_else(|| Error::Config {
            message: format!("invalid buildspec path: {}", path),
            hint: Some("expected {full/,}buildspecs/<milestone>/<build>.0.0[-rcN].xml".to_string()),
        })?;
        let milestone = captures
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| Error::Config {
                message: format!("invalid milestone in buildspec path: {}", path),
                hint: None,
            })?;
        let version = Version::parse(captures.get(3).map(|m| m.as_str()).unwrap_or_default())?;
        Ok(BuildspecPath {
            path: path.to_string(),
            milestone,
            version,
            full: captures.get(1).is_some(),
        })
    }
}

impl PartialOrd for BuildspecPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BuildspecPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.milestone
            .cmp(&other.milestone)
            .then_with(|| self.version.cmp(&other.version))
    }
}
