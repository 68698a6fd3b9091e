// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Version Rules
//!
//! Identifier syntax and version satisfaction shared by the planner, the
//! descriptor tree loader and both dependency resolvers.
//!
//! | Function | Applies to |
//! |----------|------------|
//! | `ArtifactId::parse` | `name-version` ids of applications and modules |
//! | `satisfies` | application dependency ranges (`1.0.0`, `^1.0.0`, `~1.2.0`, `>=1.0.0 <2.0.0`, `a || b`) |
//! | `is_interface_compatible` | module `requires` against another module's `provides` |
//!
//! Pre-release and snapshot builds (`1.2.0-SNAPSHOT.14`) satisfy a range when
//! their release core does, unless the range itself pins a pre-release.

use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::OnceLock;
use thiserror::Error;

static ARTIFACT_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn artifact_id_pattern() -> &'static Regex {
    ARTIFACT_ID_PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<name>.+?)-(?P<version>\d+\.\d+\.\d+(?:[-+].*)?)$")
            .expect("Invariant: artifact id pattern is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid artifact id '{0}': expected '<name>-<major>.<minor>.<patch>'")]
    InvalidArtifactId(String),

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },
}

/// Identifier of a versioned artifact (`mod-users-19.2.0`, `app-platform-1.0.0-SNAPSHOT.3`).
///
/// Ordering is lexicographic over the raw id, which is what level and bucket
/// output relies on for determinism.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    raw: String,
    name_len: usize,
}

/// Application identifier (`name-version`)
pub type ApplicationId = ArtifactId;

/// Module identifier (`name-version`)
pub type ModuleId = ArtifactId;

impl ArtifactId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, VersionError> {
        let raw = raw.into();
        let name_len = artifact_id_pattern()
            .captures(&raw)
            .and_then(|caps| caps.name("name"))
            .map(|name| name.end())
            .ok_or_else(|| VersionError::InvalidArtifactId(raw.clone()))?;
        Ok(Self { raw, name_len })
    }

    /// Build an id from its parts. The version is not validated.
    pub fn from_parts(name: &str, version: &str) -> Self {
        Self {
            raw: format!("{}-{}", name, version),
            name_len: name.len(),
        }
    }

    pub fn name(&self) -> &str {
        &self.raw[..self.name_len]
    }

    pub fn version(&self) -> &str {
        &self.raw[self.name_len + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for ArtifactId {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.raw
    }
}

pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    Version::parse(version.trim().trim_start_matches('v')).map_err(|e| VersionError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// Compare two versions by semantic-version precedence (build metadata ignored)
pub fn compare_versions(left: &str, right: &str) -> Result<Ordering, VersionError> {
    let left = parse_version(left)?;
    let right = parse_version(right)?;
    Ok(left.cmp_precedence(&right))
}

/// Check whether `version` satisfies the dependency `range`.
///
/// A bare version is an exact match. `||` separates alternatives, whitespace
/// separates comparators that must all hold.
pub fn satisfies(version: &str, range: &str) -> Result<bool, VersionError> {
    let version = parse_version(version)?;
    for alternative in range.split("||") {
        if satisfies_alternative(&version, alternative.trim())? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn satisfies_alternative(version: &Version, range: &str) -> Result<bool, VersionError> {
    if range.is_empty() || range == "*" || range.eq_ignore_ascii_case("latest") {
        return Ok(true);
    }

    let exact = range.trim_start_matches('=').trim_start_matches('v');
    if let Ok(exact) = Version::parse(exact) {
        return Ok(version.cmp_precedence(&exact).is_eq());
    }

    let req = VersionReq::parse(&normalize_range(range)).map_err(|e| VersionError::InvalidRange {
        range: range.to_string(),
        reason: e.to_string(),
    })?;

    if req.matches(version) {
        return Ok(true);
    }

    if !version.pre.is_empty() && req.comparators.iter().all(|c| c.pre.is_empty()) {
        let release = Version::new(version.major, version.minor, version.patch);
        return Ok(req.matches(&release));
    }

    Ok(false)
}

/// Rewrite npm-style ranges into the comma-separated form `semver` parses.
fn normalize_range(range: &str) -> String {
    if let Some((low, high)) = range.split_once(" - ") {
        return format!(">={}, <={}", low.trim(), high.trim());
    }
    if range.contains(',') {
        return range.to_string();
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in range.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{}{}", op, token)),
            None => comparators.push(token.to_string()),
        }
    }
    comparators.join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InterfaceVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

impl InterfaceVersion {
    fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(patch) => patch.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

/// Interface versions are `major.minor[.patch]`; a requirement may list
/// space-separated alternatives (`"1.2 2.0"`). A provider is compatible with
/// an alternative when the majors match and it is not older.
pub fn is_interface_compatible(provided: &str, required: &str) -> bool {
    let Some(provided) = InterfaceVersion::parse(provided) else {
        return false;
    };
    required
        .split_whitespace()
        .filter_map(InterfaceVersion::parse)
        .any(|req| {
            provided.major == req.major && (provided.minor, provided.patch) >= (req.minor, req.patch)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_id_parsing() {
        let id = ArtifactId::parse("app-platform-minimal-1.2.0").unwrap();
        assert_eq!(id.name(), "app-platform-minimal");
        assert_eq!(id.version(), "1.2.0");

        let snapshot = ArtifactId::parse("mod-users-19.2.0-SNAPSHOT.143").unwrap();
        assert_eq!(snapshot.name(), "mod-users");
        assert_eq!(snapshot.version(), "19.2.0-SNAPSHOT.143");

        let numeric_name = ArtifactId::parse("app-2-1.0.0").unwrap();
        assert_eq!(numeric_name.name(), "app-2");
        assert_eq!(numeric_name.version(), "1.0.0");
    }

    #[test]
    fn test_artifact_id_rejects_missing_version() {
        assert!(ArtifactId::parse("app1").is_err());
        assert!(ArtifactId::parse("app1-1.0").is_err());
        assert!(ArtifactId::parse("-1.0.0").is_err());
    }

    #[test]
    fn test_artifact_id_serde_uses_raw_string() {
        let id = ArtifactId::from_parts("app1", "1.0.0");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"app1-1.0.0\"");
        let back: ArtifactId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ArtifactId>("\"broken\"").is_err());
    }

    #[test]
    fn test_exact_version_satisfaction() {
        assert!(satisfies("1.0.0", "1.0.0").unwrap());
        assert!(!satisfies("1.0.1", "1.0.0").unwrap());
        assert!(satisfies("1.0.0", "=1.0.0").unwrap());
    }

    #[test]
    fn test_caret_and_tilde_ranges() {
        assert!(satisfies("1.4.2", "^1.0.0").unwrap());
        assert!(!satisfies("2.0.0", "^1.0.0").unwrap());
        assert!(satisfies("1.2.9", "~1.2.0").unwrap());
        assert!(!satisfies("1.3.0", "~1.2.0").unwrap());
    }

    #[test]
    fn test_compound_and_alternative_ranges() {
        assert!(satisfies("1.5.0", ">=1.0.0 <2.0.0").unwrap());
        assert!(satisfies("1.5.0", ">= 1.0.0 < 2.0.0").unwrap());
        assert!(!satisfies("2.0.0", ">=1.0.0 <2.0.0").unwrap());
        assert!(satisfies("3.1.0", "^1.0.0 || ^3.0.0").unwrap());
        assert!(satisfies("1.5.0", "1.0.0 - 2.0.0").unwrap());
    }

    #[test]
    fn test_snapshot_versions_satisfy_by_release_core() {
        assert!(satisfies("1.1.0-SNAPSHOT.12", "^1.0.0").unwrap());
        assert!(!satisfies("2.0.0-SNAPSHOT.1", "^1.0.0").unwrap());
        assert!(satisfies("1.0.0-SNAPSHOT.5", "1.0.0-SNAPSHOT.5").unwrap());
        assert!(!satisfies("1.0.0-SNAPSHOT.4", "1.0.0-SNAPSHOT.5").unwrap());
    }

    #[test]
    fn test_invalid_inputs_are_errors() {
        assert!(matches!(satisfies("not-a-version", "^1.0.0"), Err(VersionError::InvalidVersion { .. })));
        assert!(matches!(satisfies("1.0.0", "^^1"), Err(VersionError::InvalidRange { .. })));
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.0.0", "1.1.0").unwrap(), Ordering::Less);
        assert_eq!(compare_versions("1.1.0-SNAPSHOT.1", "1.1.0").unwrap(), Ordering::Less);
        assert_eq!(compare_versions("2.0.0", "1.9.9").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_interface_compatibility() {
        assert!(is_interface_compatible("1.2", "1.0"));
        assert!(is_interface_compatible("1.2", "1.2"));
        assert!(!is_interface_compatible("1.1", "1.2"));
        assert!(!is_interface_compatible("2.0", "1.0"));
        assert!(is_interface_compatible("2.1", "1.5 2.0"));
        assert!(is_interface_compatible("1.2.3", "1.2.1"));
        assert!(!is_interface_compatible("garbage", "1.0"));
    }
}
