//! Path Model
//!
//! A location inside a JSON document has three interchangeable forms:
//! a segment list, a JSON Pointer (`/a/0/b`) and a JSONPath (`$.a[0].b`).
//!
//! ## Invariants
//!
//! 1. Every segment list starts with the synthetic root key segment `$`.
//! 2. Index segments only follow array nodes; key segments only follow objects.
//! 3. A pointer component is an index segment iff it matches `^[0-9]+$`.
//! 4. `parse_pointer(to_pointer(s)) == s` and `parse_path(to_path(s)) == s`
//!    for any rooted `s` without numeric object keys.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::PathError;

lazy_static! {
    static ref INDEX_COMPONENT: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// Value of the synthetic root segment.
pub const ROOT: &str = "$";

// ═══════════════════════════════════════════════════════════════════════════════
// SEGMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Key,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub value: String,
}

impl PathSegment {
    pub fn root() -> Self {
        Self::key(ROOT)
    }

    pub fn key(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Key,
            value: value.into(),
        }
    }

    pub fn index(index: usize) -> Self {
        Self {
            kind: SegmentKind::Index,
            value: index.to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == SegmentKind::Key && self.value == ROOT
    }

    pub fn is_index(&self) -> bool {
        self.kind == SegmentKind::Index
    }

    /// Numeric value of an index segment. `None` for keys and for indices
    /// that do not fit into `usize`.
    pub fn as_index(&self) -> Option<usize> {
        match self.kind {
            SegmentKind::Index => self.value.parse().ok(),
            SegmentKind::Key => None,
        }
    }
}

/// A JSONPath step as written, before wildcards are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Key(String),
    Index(String),
    Wildcard,
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSONPATH
// ═══════════════════════════════════════════════════════════════════════════════

/// Splits a JSONPath into steps. The leading `$` is consumed and not returned.
///
/// Supported syntax: `.name`, `.*`, `['name']`, `["name"]`, `[0]`, `[*]`.
pub fn tokenize_path(path: &str) -> Result<Vec<PathToken>, PathError> {
    let chars: Vec<char> = path.trim().chars().collect();
    if chars.first() != Some(&'$') {
        return Err(PathError::MissingRoot {
            path: path.to_string(),
        });
    }

    let unexpected = |offset: usize, found: char| PathError::UnexpectedChar {
        path: path.to_string(),
        offset,
        found,
    };

    let mut tokens = Vec::new();
    let mut pos = 1;
    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                if chars.get(pos) == Some(&'*') {
                    tokens.push(PathToken::Wildcard);
                    pos += 1;
                    continue;
                }
                let start = pos;
                while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                    pos += 1;
                }
                if start == pos {
                    return Err(unexpected(start - 1, '.'));
                }
                tokens.push(PathToken::Key(chars[start..pos].iter().collect()));
            }
            '[' => {
                pos += 1;
                match chars.get(pos) {
                    Some('*') => {
                        pos += 1;
                        tokens.push(PathToken::Wildcard);
                    }
                    Some(&quote) if quote == '\'' || quote == '"' => {
                        pos += 1;
                        let mut key = String::new();
                        loop {
                            match chars.get(pos) {
                                None => {
                                    return Err(PathError::UnterminatedBracket {
                                        path: path.to_string(),
                                    })
                                }
                                Some('\\') => {
                                    let escaped = chars.get(pos + 1).copied().ok_or_else(|| {
                                        PathError::UnterminatedBracket {
                                            path: path.to_string(),
                                        }
                                    })?;
                                    key.push(escaped);
                                    pos += 2;
                                }
                                Some(&c) if c == quote => {
                                    pos += 1;
                                    break;
                                }
                                Some(&c) => {
                                    key.push(c);
                                    pos += 1;
                                }
                            }
                        }
                        tokens.push(PathToken::Key(key));
                    }
                    Some(c) if c.is_ascii_digit() => {
                        let start = pos;
                        while pos < chars.len() && chars[pos].is_ascii_digit() {
                            pos += 1;
                        }
                        tokens.push(PathToken::Index(chars[start..pos].iter().collect()));
                    }
                    Some(&c) => return Err(unexpected(pos, c)),
                    None => {
                        return Err(PathError::UnterminatedBracket {
                            path: path.to_string(),
                        })
                    }
                }
                match chars.get(pos) {
                    Some(']') => pos += 1,
                    Some(&c) => return Err(unexpected(pos, c)),
                    None => {
                        return Err(PathError::UnterminatedBracket {
                            path: path.to_string(),
                        })
                    }
                }
            }
            c => return Err(unexpected(pos, c)),
        }
    }
    Ok(tokens)
}

/// Parses a concrete JSONPath (no wildcards) into a rooted segment list.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    let mut segments = vec![PathSegment::root()];
    for token in tokenize_path(path)? {
        match token {
            PathToken::Key(key) => segments.push(PathSegment::key(key)),
            PathToken::Index(value) => segments.push(PathSegment {
                kind: SegmentKind::Index,
                value,
            }),
            PathToken::Wildcard => {
                return Err(PathError::WildcardNotAllowed {
                    path: path.to_string(),
                })
            }
        }
    }
    Ok(segments)
}

fn needs_brackets(key: &str) -> bool {
    key.is_empty()
        || key
            .chars()
            .any(|c| matches!(c, '.' | '[' | ']' | '\'' | '"' | '\\' | '*') || c.is_whitespace())
}

/// Serializes a segment list to JSONPath. Keys that the dot notation cannot
/// carry are written as `['key']`.
pub fn to_path(segments: &[PathSegment]) -> String {
    let mut out = String::from(ROOT);
    for segment in skip_root(segments) {
        match segment.kind {
            SegmentKind::Index => {
                out.push('[');
                out.push_str(&segment.value);
                out.push(']');
            }
            SegmentKind::Key if needs_brackets(&segment.value) => {
                out.push_str("['");
                out.push_str(&segment.value.replace('\\', "\\\\").replace('\'', "\\'"));
                out.push_str("']");
            }
            SegmentKind::Key => {
                out.push('.');
                out.push_str(&segment.value);
            }
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON POINTER
// ═══════════════════════════════════════════════════════════════════════════════

fn unescape_component(component: &str, pointer: &str) -> Result<String, PathError> {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            other => {
                return Err(PathError::InvalidEscape {
                    pointer: pointer.to_string(),
                    found: other.map(String::from).unwrap_or_default(),
                })
            }
        }
    }
    Ok(out)
}

/// Parses an RFC 6901 JSON Pointer into a rooted segment list.
pub fn parse_pointer(pointer: &str) -> Result<Vec<PathSegment>, PathError> {
    let mut segments = vec![PathSegment::root()];
    if pointer.is_empty() {
        return Ok(segments);
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| PathError::MissingLeadingSlash {
            pointer: pointer.to_string(),
        })?;

    for component in rest.split('/') {
        let value = unescape_component(component, pointer)?;
        let kind = if INDEX_COMPONENT.is_match(&value) {
            SegmentKind::Index
        } else {
            SegmentKind::Key
        };
        segments.push(PathSegment { kind, value });
    }
    Ok(segments)
}

/// Serializes a segment list to an RFC 6901 JSON Pointer.
pub fn to_pointer(segments: &[PathSegment]) -> String {
    skip_root(segments)
        .iter()
        .map(|s| format!("/{}", s.value.replace('~', "~0").replace('/', "~1")))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPARISON
// ═══════════════════════════════════════════════════════════════════════════════

fn skip_root(segments: &[PathSegment]) -> &[PathSegment] {
    match segments.first() {
        Some(first) if first.is_root() => &segments[1..],
        _ => segments,
    }
}

/// True iff both paths have the same segments (kind and value).
pub fn paths_equal(a: &[PathSegment], b: &[PathSegment]) -> bool {
    a == b
}

/// True iff `candidate_sub` is a strict prefix of `path` and the segment of
/// `path` right after it is an index, i.e. `path` points into an element of
/// the array found at `candidate_sub`.
pub fn is_array_prefix_of(path: &[PathSegment], candidate_sub: &[PathSegment]) -> bool {
    if path.len() <= candidate_sub.len() {
        return false;
    }
    path[..candidate_sub.len()] == *candidate_sub && path[candidate_sub.len()].is_index()
}
