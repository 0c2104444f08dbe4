//! Rule path patterns.
//!
//! A pattern is a `/`-separated list of segments:
//! - literal text, compared case-insensitively
//! - `:name`, capturing one segment (percent-decoded)
//! - `*`, only as the last segment, capturing the rest of the path
//!   (possibly empty) as the trailing sub-path
//!
//! Empty segments are ignored on both sides, so a trailing slash is optional.

use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty parameter name in '{0}'")]
    EmptyParam(String),
    #[error("duplicate parameter ':{name}' in '{pattern}'")]
    DuplicateParam { name: String, pattern: String },
    #[error("wildcard must be the last segment in '{0}'")]
    WildcardNotLast(String),
    #[error("invalid character in '{0}'")]
    InvalidCharacter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Lower-cased literal
    Literal(String),
    Param(String),
    Wildcard,
}

/// Compiled rule path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// What a successful match captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub params: HashMap<String, String>,
    /// Remaining path captured by a trailing `*`, without a leading slash
    pub rest: Option<String>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let parts: Vec<&str> = split_path(pattern).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut seen = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            if part.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
                return Err(PatternError::InvalidCharacter(pattern.to_string()));
            }
            if *part == "*" {
                if i + 1 != parts.len() {
                    return Err(PatternError::WildcardNotLast(pattern.to_string()));
                }
                segments.push(Segment::Wildcard);
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::EmptyParam(pattern.to_string()));
                }
                if seen.contains(&name) {
                    return Err(PatternError::DuplicateParam {
                        name: name.to_string(),
                        pattern: pattern.to_string(),
                    });
                }
                seen.push(name);
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_lowercase()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match against request path segments (already split, not decoded).
    pub fn matches(&self, path: &[&str]) -> Option<PathMatch> {
        let mut found = PathMatch::default();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    found.rest = Some(path.get(i..).unwrap_or_default().join("/"));
                    return Some(found);
                }
                Segment::Literal(lit) => {
                    let part = path.get(i)?;
                    if !part.eq_ignore_ascii_case(lit) && part.to_lowercase() != *lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = path.get(i)?;
                    let value = urlencoding::decode(part)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| part.to_string());
                    found.params.insert(name.clone(), value);
                }
            }
        }

        (path.len() == self.segments.len()).then_some(found)
    }
}

/// Non-empty `/`-separated segments of a path.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
