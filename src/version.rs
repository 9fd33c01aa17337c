//! Version string helpers.
//!
//! Versions are opaque strings. The only places that look inside them are the
//! fallback installer (which retries semver tags with the `v` prefix toggled)
//! and list ordering.

use crate::error::{GenvError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

pub const LATEST: &str = "latest";

fn semver_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^v?([0-9]+)(\.[0-9]+)?(\.[0-9]+)?(-([0-9A-Za-z\-]+(\.[0-9A-Za-z\-]+)*))?(\+([0-9A-Za-z\-]+(\.[0-9A-Za-z\-]+)*))?$",
        )
        .expect("semver regex compiles")
    })
}

/// Whether `version` looks like a release tag: one to three dotted numeric
/// components, an optional leading `v`, and optional pre-release/build parts.
///
/// Commit hashes and `latest` are not semver.
pub fn is_semver(version: &str) -> bool {
    semver_regex().is_match(version)
}

/// Strips a leading `v` if present, otherwise adds one.
pub fn toggle_v_prefix(version: &str) -> String {
    match version.strip_prefix('v') {
        Some(stripped) => stripped.to_string(),
        None => format!("v{}", version),
    }
}

/// Rejects versions that cannot be used as a single directory name.
pub fn validate_version(version: &str) -> Result<()> {
    let reason = if version.is_empty() {
        Some("version cannot be empty")
    } else if version == "." || version == ".." {
        Some("version cannot be a relative path component")
    } else if version.contains('/') || version.contains('\\') {
        Some("version cannot contain a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(GenvError::InvalidVersion {
            version: version.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_loose(version: &str) -> Option<semver::Version> {
    if !is_semver(version) {
        return None;
    }
    let clean = version.trim_start_matches('v');
    let split_at = clean.find(['-', '+']).unwrap_or(clean.len());
    let (core, suffix) = clean.split_at(split_at);

    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    semver::Version::parse(&format!("{}{}", parts.join("."), suffix)).ok()
}

/// Orders semver versions by precedence first, then everything else
/// lexicographically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_loose(a), parse_loose(b)) {
        (Some(a_semver), Some(b_semver)) => a_semver.cmp(&b_semver).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
