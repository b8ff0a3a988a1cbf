// src/package/mod.rs

//! Package model
//!
//! A [`PackageDescriptor`] is the immutable description of one installable
//! unit as reported by a package source: its name, where it comes from, the
//! names it depends on and an opaque content identity used to decide whether
//! an installed copy is up to date.

mod metadata;
mod spec;

pub use metadata::{BuildSpec, PackageMetadata, VersionOp, VersionSpec, DEFAULT_BUILD_STEP};
pub use spec::{Origin, PackageSpec};

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("package name pattern is valid")
});

/// A validated, normalized package name
///
/// Names are lower-cased and `_` is folded to `-` before validation, so
/// `My_Solver` and `my-solver` name the same package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Normalize and validate a package name
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase().replace('_', "-");
        if NAME_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(Error::InvalidName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

/// Opaque marker of a specific revision of a package (e.g. a commit hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentity(String);

impl ContentIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Description of one installable package
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub name: PackageName,
    pub origin: Origin,
    /// Declared dependencies, in declaration order, without duplicates
    pub dependencies: Vec<PackageName>,
    /// Current content identity at the origin, `None` if it cannot be known
    pub identity: Option<ContentIdentity>,
    pub metadata: PackageMetadata,
}

impl PackageDescriptor {
    /// Create a descriptor with no dependencies and unknown identity
    pub fn new(name: PackageName, origin: Origin) -> Self {
        Self {
            name,
            origin,
            dependencies: Vec::new(),
            identity: None,
            metadata: PackageMetadata::default(),
        }
    }

    /// Build a descriptor from package metadata, taking dependencies from
    /// its `requires` list
    pub fn from_metadata(
        name: PackageName,
        origin: Origin,
        metadata: PackageMetadata,
        identity: Option<ContentIdentity>,
    ) -> Result<Self> {
        let dependencies = metadata
            .requires
            .iter()
            .map(|dep| PackageName::new(dep))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(name, origin)
            .with_dependencies(dependencies)
            .with_identity(identity)
            .with_metadata(metadata))
    }

    /// Set the dependency list, collapsing duplicates while keeping order
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = PackageName>) -> Self {
        let mut seen = HashSet::new();
        self.dependencies = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect();
        self
    }

    pub fn with_identity(mut self, identity: Option<ContentIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the given installed identity matches the current one
    ///
    /// An unknown identity on either side never matches.
    pub fn is_up_to_date(&self, installed: Option<&ContentIdentity>) -> bool {
        matches!((&self.identity, installed), (Some(current), Some(old)) if current == old)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|dep| dep.as_str() == name)
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin.to_record() {
            Some(origin) => write!(f, "{} @ {}", self.name, origin),
            None => write!(f, "{}", self.name),
        }
    }
}
