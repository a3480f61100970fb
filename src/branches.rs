//! # Branch Enumerator
//!
//! Derives the set of active release branches from the manifest-internal
//! repository's ref list, filtered by a minimum milestone threshold. An
//! explicit branch list short-circuits derivation entirely.
//!
//! Release branch names follow the convention `release-R<N>-<build>.B`,
//! optionally prefixed with `refs/heads/`. Enumeration is deterministic:
//! branches are ordered by descending milestone so that newer branches
//! converge first under a batch deadline, with `main` last when included.

use regex::Regex;

use crate::error::Result;

const RELEASE_BRANCH_PATTERN: &str = r"^(?:refs/heads/)?(release-R(\d+)-(\d+)\.B)$";

/// A release branch together with its parsed milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseBranch {
    /// Branch name without the `refs/heads/` prefix.
    pub name: String,
    /// Milestone number (the `N` of `release-RN-…`).
    pub milestone: u32,
}

/// Parse a ref or branch name as a release branch.
pub fn parse_release_branch(ref_name: &str) -> Option<ReleaseBranch> {
    let re = Regex::new(RELEASE_BRANCH_PATTERN).ok()?;
    let captures = re.captures(ref_name.trim())?;
    let name = captures.get(1)?.as_str().to_string();
    let milestone = captures.get(2)?.as_str().parse().ok()?;
    Some(ReleaseBranch { name, milestone })
}

/// The milestone of a release branch name, if it is one.
pub fn milestone_of(branch: &str) -> Option<u32> {
    parse_release_branch(branch).map(|b| b.milestone)
}

/// Select the release branches with milestone >= `min_milestone` from a ref
/// list, sorted by descending milestone.
pub fn release_branches<'a, I>(refs: I, min_milestone: u32) -> Vec<ReleaseBranch>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut branches: Vec<ReleaseBranch> = refs
        .into_iter()
        .filter_map(parse_release_branch)
        .filter(|b| b.milestone >= min_milestone)
        .collect();
    branches.sort_by(|a, b| b.milestone.cmp(&a.milestone).then(a.name.cmp(&b.name)));
    branches.dedup();
    branches
}

/// The set of branches a batch should process.
///
/// When `explicit` is provided it is returned verbatim. Otherwise release
/// branches are derived from `refs` and filtered by `min_milestone`, and
/// `main` is appended when the current trunk milestone is known and at least
/// `min_milestone`.
pub fn active_branches<'a, I>(
    refs: I,
    min_milestone: u32,
    trunk_milestone: Option<u32>,
    explicit: Option<&[String]>,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if let Some(explicit) = explicit {
        return explicit.to_vec();
    }
    let mut branches: Vec<String> = release_branches(refs, min_milestone)
        .into_iter()
        .map(|b| b.name)
        .collect();
    if let Some(trunk) = trunk_milestone {
        if min_milestone <= trunk {
            branches.push("main".to_string());
        }
    }
    branches
}

/// The branch a buildspec of the given milestone freezes.
///
/// An exact `release-R<milestone>-…` match wins. A milestone newer than
/// every known release branch is still on trunk and maps to `main` (this
/// also absorbs skipped milestones at the tip). Anything else is an error.
pub fn branch_for_milestone(branches: &[ReleaseBranch], milestone: u32) -> Result<String> {
    if let Some(branch) = branches.iter().find(|b| b.milestone == milestone) {
        return Ok(branch.name.clone());
    }
    let newest = branches.iter().map(|b| b.milestone).max().unwrap_or(0);
    if milestone > newest {
        return Ok("main".to_string());
    }
    Err(crate::error::Error::Config {
        message: format!("no release branch found for milestone {}", milestone),
        hint: None,
    })
}
