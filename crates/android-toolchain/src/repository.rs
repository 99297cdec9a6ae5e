//! Artifact Repository Patterns
//!
//! Resolves coordinates against Ivy-style artifact patterns such as
//! `https://dl.google.com/android/repository/[artifact]_[revision](-[classifier]).[ext]`.

use std::sync::OnceLock;
use regex::Regex;
use sdkdeps_core::ArtifactCoordinate;
use tracing::debug;

fn token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[([A-Za-z]+)\]").unwrap())
}

/// A piece of a pattern: always emitted, or dropped when a token inside is missing
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Required(String),
    Optional(String),
}

/// Ordered list of artifact patterns
#[derive(Debug, Clone)]
pub struct IvyPatterns {
    patterns: Vec<String>,
}

impl IvyPatterns {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Candidate locations for a coordinate, in declaration order
    pub fn candidates(&self, coord: &ArtifactCoordinate) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        for pattern in &self.patterns {
            match resolve_pattern(pattern, coord) {
                Some(location) if !candidates.contains(&location) => candidates.push(location),
                Some(_) => {}
                None => debug!("Pattern {} does not apply to {}", pattern, coord),
            }
        }
        candidates
    }
}

/// Value of a pattern token for a coordinate; `None` when unknown or unset
fn token_value<'a>(token: &str, coord: &'a ArtifactCoordinate) -> Option<&'a str> {
    let value = match token {
        "organisation" | "organization" => coord.group.as_str(),
        "artifact" | "module" => coord.name.as_str(),
        "revision" => coord.version.as_str(),
        "classifier" => coord.classifier()?,
        "ext" | "type" => coord.extension.as_str(),
        _ => return None,
    };
    Some(value).filter(|v| !v.is_empty())
}

fn split_segments(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_optional = false;

    for ch in pattern.chars() {
        match ch {
            '(' if !in_optional => {
                if !current.is_empty() {
                    segments.push(Segment::Required(std::mem::take(&mut current)));
                }
                in_optional = true;
            }
            ')' if in_optional => {
                segments.push(Segment::Optional(std::mem::take(&mut current)));
                in_optional = false;
            }
            _ => current.push(ch),
        }
    }

    // an unbalanced '(' is taken literally
    if in_optional {
        current.insert(0, '(');
    }
    if !current.is_empty() {
        segments.push(Segment::Required(current));
    }
    segments
}

/// Substitute every token in `text`; `None` if any token has no value
fn substitute(text: &str, coord: &ArtifactCoordinate) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in token_regex().captures_iter(text) {
        let whole = caps.get(0)?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(token_value(&caps[1], coord)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Some(out)
}

/// Resolve one pattern; `None` when a required token has no value
pub fn resolve_pattern(pattern: &str, coord: &ArtifactCoordinate) -> Option<String> {
    let mut location = String::new();
    for segment in split_segments(pattern) {
        match segment {
            Segment::Required(text) => location.push_str(&substitute(&text, coord)?),
            Segment::Optional(text) => {
                if let Some(resolved) = substitute(&text, coord) {
                    location.push_str(&resolved);
                }
            }
        }
    }
    Some(location)
}

/// Last path segment of a location, used as the file name in mirrors
pub fn location_file_name(location: &str) -> &str {
    let trimmed = location.split(['?', '#']).next().unwrap_or(location);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
