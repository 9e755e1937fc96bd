//! Package specifier parsing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Raised when a specifier has no package name, e.g. "=1.2".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid package specifier '{spec}': package name cannot be empty. Expected 'name' or 'name=version'.")]
pub struct InvalidSpecifierError {
    pub spec: String,
}

/// A declared or installed package.
/// Format: "name" or "name=version"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(String::from),
        }
    }

    /// The version, if one is set and non-empty.
    pub fn requested_version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.requested_version() {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for PackageSpec {
    type Err = InvalidSpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        split_name_version(s, None)
    }
}

/// Split a specifier on its first `=` into name and version.
///
/// Without an `=`, the version is `default_version`.
pub fn split_name_version(
    spec: &str,
    default_version: Option<&str>,
) -> Result<PackageSpec, InvalidSpecifierError> {
    let (name, version) = match spec.split_once('=') {
        Some((name, version)) => (name, Some(version)),
        None => (spec, default_version),
    };

    if name.is_empty() {
        return Err(InvalidSpecifierError {
            spec: spec.to_string(),
        });
    }

    Ok(PackageSpec::new(name, version))
}
