//! # Minimal-Diff XML Rewriter
//!
//! Applies a *semantic* update to a manifest file while keeping the file's
//! comments, whitespace, attribute order on unchanged attributes, and element
//! ordering intact.
//!
//! A naive parse/serialize round-trip is deliberately avoided: reviewers and
//! downstream tools rely on textual stability of `local_manifest.xml`, and a
//! round-trip would drop comments and reorder unrelated attributes. Instead,
//! `<default>`, `<remote>` and `<project>` start-tags are located in the raw
//! stream with a bounded regex and their attributes are edited in place.
//!
//! ## Attribute sync rule
//!
//! For every element matched against the reference model: an attribute whose
//! reference value is empty is deleted from the tag; a non-empty reference
//! value is set (inserted or substituted). Attributes the model does not
//! track are left untouched.
//!
//! ## Guarantee
//!
//! Rewriting a file against the model parsed from that same file yields the
//! input byte-for-byte with `changed == false`.

use std::collections::HashSet;
use std::ops::Range;

use regex::Regex;

use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// A single pending textual edit: replace `range` with `text`.
struct Edit {
    range: Range<usize>,
    text: String,
}

/// Update the `<default>`, `<remote>` and `<project>` elements of the raw
/// manifest text so that their attributes agree with `reference`.
///
/// In `strict` mode, projects whose path is absent from the reference are
/// removed along with their subtree; otherwise they are left intact.
///
/// Returns the new text and whether it differs from the input.
pub fn rewrite(input: &str, reference: &Manifest, strict: bool) -> Result<(String, bool)> {
    let tag_re = Regex::new(r"<(default|remote|project)\b[^>]*>")?;
    let comments = comment_ranges(input);

    let mut edits: Vec<Edit> = Vec::new();
    let mut default_count = 0;
    let mut touched_remotes: HashSet<String> = HashSet::new();

    for captures in tag_re.captures_iter(input) {
        let whole = match captures.get(0) {
            Some(whole) => whole,
            None => continue,
        };
        if in_comment(&comments, whole.start()) {
            continue;
        }
        let tag = whole.as_str();
        let kind = captures.get(1).map(|m| m.as_str()).unwrap_or_default();

        match kind {
            "default" => {
                default_count += 1;
                if default_count > 1 {
                    return Err(Error::MultipleDefaults);
                }
                if reference.defaults.is_empty() {
                    continue;
                }
                let updates = [
                    ("remote", reference.defaults.remote_name.as_str()),
                    ("revision", reference.defaults.revision.as_str()),
                    ("sync-j", reference.defaults.sync_j.as_str()),
                ];
                if let Some(new_tag) = sync_attributes(tag, &updates)? {
                    edits.push(Edit {
                        range: whole.range(),
                        text: new_tag,
                    });
                }
            }
            "remote" => {
                let name = attribute_value(tag, "name")?.unwrap_or_default();
                let remote = match reference.remote_by_name(&name) {
                    Some(remote) => remote,
                    None => continue,
                };
                touched_remotes.insert(name);
                let updates = [
                    ("fetch", remote.fetch.as_str()),
                    ("name", remote.name.as_str()),
                    ("revision", remote.revision.as_str()),
                    ("alias", remote.alias.as_str()),
                ];
                if let Some(new_tag) = sync_attributes(tag, &updates)? {
                    edits.push(Edit {
                        range: whole.range(),
                        text: new_tag,
                    });
                }
            }
            "project" => {
                let path = attribute_value(tag, "path")?;
                let name = attribute_value(tag, "name")?.unwrap_or_default();
                // Path is the authoritative key when present; otherwise the
                // name stands in.
                let project = match &path {
                    Some(path) => reference.project_by_path(path),
                    None => reference.projects_by_name(&name).into_iter().next(),
                };
                match project {
                    Some(project) => {
                        let updates = [
                            ("name", project.name.as_str()),
                            ("path", project.path.as_str()),
                            ("revision", project.revision.as_str()),
                            ("upstream", project.upstream.as_str()),
                            ("remote", project.remote_name.as_str()),
                            ("groups", project.groups.as_str()),
                            ("sync-c", project.sync_c.as_str()),
                        ];
                        if let Some(new_tag) = sync_attributes(tag, &updates)? {
                            edits.push(Edit {
                                range: whole.range(),
                                text: new_tag,
                            });
                        }
                    }
                    None if strict => {
                        let range = element_range(input, whole.range())?;
                        edits.push(Edit {
                            range,
                            text: String::new(),
                        });
                    }
                    None => {}
                }
            }
            _ => {}
        }
    }

    if default_count == 0 && !reference.defaults.is_empty() {
        return Err(Error::MissingDefault);
    }

    let untouched: Vec<&str> = reference
        .remotes
        .iter()
        .map(|r| r.name.as_str())
        .filter(|name| !touched_remotes.contains(*name))
        .collect();
    if !untouched.is_empty() {
        return Err(Error::ExtraReferenceRemote {
            remotes: untouched.join(", "),
        });
    }

    let output = apply_edits(input, edits);
    let changed = output != input;
    Ok((output, changed))
}

/// Apply the attribute sync rule to one start-tag.
///
/// Returns `Some(new_tag)` when the tag text changed, `None` when every
/// attribute already agrees with the reference.
fn sync_attributes(tag: &str, updates: &[(&str, &str)]) -> Result<Option<String>> {
    let mut current = tag.to_string();
    for (attr, value) in updates {
        let existing = attribute_value(&current, attr)?;
        if value.is_empty() {
            if existing.is_some() {
                current = delete_attribute(&current, attr)?;
            }
        } else {
            match existing {
                Some(existing) if existing == *value => {}
                Some(_) => current = replace_attribute(&current, attr, value)?,
                None => current = insert_attribute(&current, attr, value),
            }
        }
    }
    if current == tag {
        return Ok(None);
    }
    Ok(Some(normalize_tag_whitespace(&current)))
}

/// The value of an attribute inside a start-tag, if present.
fn attribute_value(tag: &str, attr: &str) -> Result<Option<String>> {
    let re = attribute_regex(attr)?;
    Ok(re.captures(tag).map(|c| {
        c.get(2)
            .or_else(|| c.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }))
}

fn attribute_regex(attr: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r#"\s{}\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(attr)
    ))?)
}

fn delete_attribute(tag: &str, attr: &str) -> Result<String> {
    let re = Regex::new(&format!(
        r#"\s+{}\s*=\s*(?:"[^"]*"|'[^']*')"#,
        regex::escape(attr)
    ))?;
    Ok(re.replace(tag, "").into_owned())
}

fn replace_attribute(tag: &str, attr: &str, value: &str) -> Result<String> {
    let re = Regex::new(&format!(
        r#"(\s{}\s*=\s*)(?:"[^"]*"|'[^']*')"#,
        regex::escape(attr)
    ))?;
    let escaped = escape_attribute(value);
    Ok(re
        .replace(tag, |caps: &regex::Captures| {
            format!("{}\"{}\"", &caps[1], escaped)
        })
        .into_owned())
}

fn insert_attribute(tag: &str, attr: &str, value: &str) -> String {
    let insertion = format!(" {}=\"{}\"", attr, escape_attribute(value));
    if let Some(stripped) = tag.strip_suffix("/>") {
        format!("{}{}/>", stripped, insertion)
    } else if let Some(stripped) = tag.strip_suffix('>') {
        format!("{}{}>", stripped, insertion)
    } else {
        // The regex guarantees a trailing '>'.
        tag.to_string()
    }
}

/// Collapse same-line whitespace runs left behind by substitutions.
///
/// Runs at the start of a line are multi-line tag indentation and are
/// preserved verbatim, as are quoted attribute values.
fn normalize_tag_whitespace(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut in_quote: Option<char> = None;
    let mut run = String::new();
    for ch in tag.chars() {
        match in_quote {
            Some(quote) => {
                out.push(ch);
                if ch == quote {
                    in_quote = None;
                }
            }
            None => {
                if ch == ' ' || ch == '\t' {
                    run.push(ch);
                    continue;
                }
                if !run.is_empty() {
                    if run.len() >= 2 && !out.ends_with('\n') {
                        out.push(' ');
                    } else {
                        out.push_str(&run);
                    }
                    run.clear();
                }
                out.push(ch);
                if ch == '"' || ch == '\'' {
                    in_quote = Some(ch);
                }
            }
        }
    }
    out.push_str(&run);
    out
}

/// The byte range of a whole `<project>` element: the start-tag for
/// self-closing elements, or through the matching `</project>` otherwise,
/// widened to swallow the line's leading indentation and trailing newline.
fn element_range(input: &str, tag_range: Range<usize>) -> Result<Range<usize>> {
    let tag = &input[tag_range.clone()];
    let mut end = tag_range.end;
    if !tag.ends_with("/>") {
        let rest = &input[tag_range.end..];
        let close = rest.find("</project").ok_or_else(|| Error::MalformedElement {
            tag: "project".to_string(),
            message: "missing closing </project> tag".to_string(),
        })?;
        if rest[..close].contains("<project") {
            return Err(Error::MalformedElement {
                tag: "project".to_string(),
                message: "nested <project> elements are not allowed".to_string(),
            });
        }
        let close_end = rest[close..].find('>').ok_or_else(|| Error::MalformedElement {
            tag: "project".to_string(),
            message: "unterminated closing </project> tag".to_string(),
        })?;
        end = tag_range.end + close + close_end + 1;
    }

    let mut start = tag_range.start;
    let line_start = input[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    if input[line_start..start].chars().all(|c| c == ' ' || c == '\t') {
        start = line_start;
        if input[end..].starts_with('\n') {
            end += 1;
        } else if input[end..].starts_with("\r\n") {
            end += 2;
        }
    }
    Ok(start..end)
}

/// Byte ranges of `<!-- ... -->` comments.
fn comment_ranges(input: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0;
    while let Some(open) = input[offset..].find("<!--") {
        let start = offset + open;
        let end = match input[start + 4..].find("-->") {
            Some(close) => start + 4 + close + 3,
            None => input.len(),
        };
        ranges.push(start..end);
        offset = end;
    }
    ranges
}

fn in_comment(comments: &[Range<usize>], position: usize) -> bool {
    comments.iter().any(|r| r.contains(&position))
}

fn apply_edits(input: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.range.start);
    let mut output = input.to_string();
    for edit in edits.into_iter().rev() {
        output.replace_range(edit.range, &edit.text);
    }
    output
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
