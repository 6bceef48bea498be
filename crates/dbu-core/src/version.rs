//! Schema version value type.
//!
//! A [`SchemaVersion`] is either a concrete `major.minor.patch` revision or
//! the "latest" sentinel, which orders after every concrete version.

use crate::error::{CoreError, CoreResult};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Literal that requests the newest declared schema version.
pub const LATEST_VERSION: &str = "LATEST";

/// Placeholder left in development builds where the release version was never
/// substituted. Treated the same as [`LATEST_VERSION`].
pub const DEV_VERSION_MARKER: &str = "@@@DB_SCHEMA_VERSION@@@";

/// Component value assigned to every part of the sentinel. Concrete
/// components are parsed as `u32`, so this is strictly larger than any of them.
const SENTINEL_COMPONENT: u64 = u64::MAX;

/// An immutable, totally ordered schema revision.
///
/// Equality, ordering and hashing only consider the three numeric components.
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    major: u64,
    minor: u64,
    patch: u64,
    latest: bool,
    text: String,
}

impl SchemaVersion {
    /// The "latest" sentinel.
    pub fn latest() -> Self {
        Self {
            major: SENTINEL_COMPONENT,
            minor: SENTINEL_COMPONENT,
            patch: SENTINEL_COMPONENT,
            latest: true,
            text: LATEST_VERSION.to_string(),
        }
    }

    /// Build a concrete version from its components.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
            patch: patch.into(),
            latest: false,
            text: format!("{major}.{minor}.{patch}"),
        }
    }

    /// Parse a version string.
    ///
    /// Accepts `N`, `N.N` and `N.N.N`. Blank input, `LATEST` and the
    /// development marker all produce the sentinel.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == LATEST_VERSION || trimmed == DEV_VERSION_MARKER {
            return Ok(Self::latest());
        }

        let tokens: Vec<&str> = trimmed.split('.').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Err(invalid(trimmed, "no major version component"));
        }
        if tokens.len() > 3 {
            return Err(invalid(
                trimmed,
                "expected at most three components (major.minor.patch)",
            ));
        }

        let mut parts = [0u64; 3];
        for (slot, token) in parts.iter_mut().zip(&tokens) {
            let value: u32 = token.parse().map_err(|_| {
                invalid(
                    trimmed,
                    &format!("component '{token}' is not a non-negative integer"),
                )
            })?;
            *slot = value.into();
        }

        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            latest: false,
            text: trimmed.to_string(),
        })
    }

    /// Parse an optional version string; `None` yields the sentinel.
    pub fn parse_optional(text: Option<&str>) -> CoreResult<Self> {
        match text {
            Some(t) => Self::parse(t),
            None => Ok(Self::latest()),
        }
    }

    /// Whether this is the "latest" sentinel.
    pub fn is_latest(&self) -> bool {
        self.latest
    }

    /// True iff `start_exclusive < self <= end_inclusive`.
    pub fn is_between(&self, start_exclusive: &SchemaVersion, end_inclusive: &SchemaVersion) -> bool {
        self > start_exclusive && self <= end_inclusive
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    fn components(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

fn invalid(text: &str, reason: &str) -> CoreError {
    CoreError::InvalidVersion {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components() == other.components()
    }
}

impl Eq for SchemaVersion {}

impl Hash for SchemaVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components().hash(state);
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components().cmp(&other.components())
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.latest {
            f.write_str(LATEST_VERSION)
        } else {
            f.write_str(&self.text)
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
#[path = "version_test.rs"]
mod tests;
