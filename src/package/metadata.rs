// src/package/metadata.rs

//! Package metadata (`metadata.json`)
//!
//! Index entries, git repositories and local directories all describe a
//! package with the same JSON document. Every field is optional.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Build step used when a package does not declare one
pub const DEFAULT_BUILD_STEP: &str = "wmake all -j";

/// How a package is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    /// Named build system (only `wmake` is supported)
    System(String),
    /// Shell commands run in order in the source directory
    Steps(Vec<String>),
}

/// Contents of a package's `metadata.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Names of required packages
    #[serde(default, alias = "dependencies", skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,

    /// Toolkit version specifiers such as `>=2306` or `==12`
    #[serde(default, rename = "version", skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,

    /// Source repository (index entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl PackageMetadata {
    /// Read metadata from a file; a missing file means empty metadata
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Shell commands that build this package
    pub fn build_steps(&self, package: &str) -> Result<Vec<String>> {
        match &self.build {
            None => Ok(vec![DEFAULT_BUILD_STEP.to_string()]),
            Some(BuildSpec::System(system)) if system == "wmake" => {
                Ok(vec![DEFAULT_BUILD_STEP.to_string()])
            }
            Some(BuildSpec::System(other)) => Err(Error::UnsupportedBuildSystem {
                package: package.to_string(),
                build: other.clone(),
            }),
            Some(BuildSpec::Steps(steps)) => Ok(steps.clone()),
        }
    }

    /// Check the declared version specifiers against the running toolkit
    ///
    /// Specifiers for the other toolkit distribution (versions below 1000
    /// versus calendar-style versions) are ignored. Unparseable specifiers
    /// are skipped with a warning.
    pub fn check_compatibility(&self, package: &str, toolkit_version: u32) -> Result<()> {
        let mut distribution_matched = false;

        for raw in &self.versions {
            let Some(spec) = VersionSpec::parse(raw) else {
                warn!("{}: ignoring invalid version specifier '{}'", package, raw);
                continue;
            };

            if !spec.same_distribution(toolkit_version) {
                continue;
            }

            distribution_matched = true;
            if !spec.matches(toolkit_version) {
                return Err(Error::Incompatible {
                    package: package.to_string(),
                    reason: format!("toolkit version is {}, but {} is required", toolkit_version, spec),
                });
            }
        }

        if !self.versions.is_empty() && !distribution_matched {
            return Err(Error::Incompatible {
                package: package.to_string(),
                reason: format!(
                    "not available for this toolkit distribution (requires {})",
                    self.versions.join(", ")
                ),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl VersionOp {
    fn as_str(self) -> &'static str {
        match self {
            VersionOp::Eq => "==",
            VersionOp::Ne => "!=",
            VersionOp::Ge => ">=",
            VersionOp::Gt => ">",
            VersionOp::Le => "<=",
            VersionOp::Lt => "<",
        }
    }
}

/// A single toolkit version requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionSpec {
    pub op: VersionOp,
    pub version: u32,
}

impl VersionSpec {
    const DISTRIBUTION_SPLIT: u32 = 1000;

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        // Two-character operators must be tried before their prefixes
        let ops = [
            ("==", VersionOp::Eq),
            ("!=", VersionOp::Ne),
            (">=", VersionOp::Ge),
            ("<=", VersionOp::Le),
            (">", VersionOp::Gt),
            ("<", VersionOp::Lt),
        ];

        ops.iter().find_map(|(prefix, op)| {
            raw.strip_prefix(prefix)
                .and_then(|rest| rest.trim().parse().ok())
                .map(|version| Self { op: *op, version })
        })
    }

    pub fn matches(&self, version: u32) -> bool {
        match self.op {
            VersionOp::Eq => version == self.version,
            VersionOp::Ne => version != self.version,
            VersionOp::Ge => version >= self.version,
            VersionOp::Gt => version > self.version,
            VersionOp::Le => version <= self.version,
            VersionOp::Lt => version < self.version,
        }
    }

    pub fn same_distribution(&self, version: u32) -> bool {
        (version < Self::DISTRIBUTION_SPLIT) == (self.version < Self::DISTRIBUTION_SPLIT)
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_metadata() {
        let metadata = PackageMetadata::from_json(
            r#"{"requires": ["a", "b"], "build": ["./Allwmake"], "version": [">=2306"], "repo": "https://example.com/x.git"}"#,
        )
        .unwrap();
        assert_eq!(metadata.requires, vec!["a", "b"]);
        assert_eq!(metadata.build_steps("x").unwrap(), vec!["./Allwmake"]);
        assert_eq!(metadata.repo.as_deref(), Some("https://example.com/x.git"));
    }

    #[test]
    fn test_dependencies_alias() {
        let metadata = PackageMetadata::from_json(r#"{"dependencies": ["core"]}"#).unwrap();
        assert_eq!(metadata.requires, vec!["core"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = PackageMetadata::from_file(&dir.path().join("metadata.json")).unwrap();
        assert_eq!(metadata, PackageMetadata::default());
    }

    #[test]
    fn test_build_steps() {
        let default = PackageMetadata::default();
        assert_eq!(default.build_steps("x").unwrap(), vec![DEFAULT_BUILD_STEP]);

        let wmake = PackageMetadata {
            build: Some(BuildSpec::System("wmake".to_string())),
            ..Default::default()
        };
        assert_eq!(wmake.build_steps("x").unwrap(), vec![DEFAULT_BUILD_STEP]);

        let cmake = PackageMetadata {
            build: Some(BuildSpec::System("cmake".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            cmake.build_steps("x"),
            Err(Error::UnsupportedBuildSystem { .. })
        ));
    }

    #[test]
    fn test_version_spec_parse() {
        assert_eq!(
            VersionSpec::parse(">=2306"),
            Some(VersionSpec { op: VersionOp::Ge, version: 2306 })
        );
        assert_eq!(
            VersionSpec::parse("<12"),
            Some(VersionSpec { op: VersionOp::Lt, version: 12 })
        );
        assert_eq!(VersionSpec::parse("~=12"), None);
        assert_eq!(VersionSpec::parse(">=abc"), None);
    }

    #[test]
    fn test_compatibility() {
        let metadata = PackageMetadata {
            versions: vec![">=2306".to_string(), ">=11".to_string()],
            ..Default::default()
        };
        assert!(metadata.check_compatibility("x", 2312).is_ok());
        assert!(metadata.check_compatibility("x", 12).is_ok());
        assert!(metadata.check_compatibility("x", 2212).is_err());
        assert!(metadata.check_compatibility("x", 10).is_err());
    }

    #[test]
    fn test_compatibility_other_distribution_only() {
        let metadata = PackageMetadata {
            versions: vec![">=2306".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            metadata.check_compatibility("x", 12),
            Err(Error::Incompatible { .. })
        ));
    }

    #[test]
    fn test_compatibility_ignores_invalid_specifiers() {
        let metadata = PackageMetadata {
            versions: vec!["latest".to_string(), "==12".to_string()],
            ..Default::default()
        };
        assert!(metadata.check_compatibility("x", 12).is_ok());
        assert!(PackageMetadata::default().check_compatibility("x", 12).is_ok());
    }
}
