// src/package/spec.rs

//! Package origins and user-supplied package specifications
//!
//! Accepted forms:
//!
//! - `name` - looked up in the package index
//! - `https://host/org/repo.git[@ref]` - cloned from a git repository
//! - `./path`, `/abs/path`, `file:///abs/path` - read from a local directory
//! - `name@<url or path>` - explicit name for one of the above

use super::PackageName;
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a package comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Entry in the community package index
    Index,
    /// Directory on the local filesystem (absolute)
    Local(PathBuf),
    /// Git repository, optionally pinned to a branch, tag or commit
    Git { url: Url, reference: Option<String> },
}

impl Origin {
    /// Parse a repository URL or filesystem path
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidOrigin(raw.to_string()));
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            return parse_git(raw);
        }

        if raw.starts_with("file://") {
            let url = Url::parse(raw).map_err(|e| Error::InvalidOrigin(format!("{}: {}", raw, e)))?;
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidOrigin(raw.to_string()))?;
            return Ok(Origin::Local(path));
        }

        let path = std::path::absolute(Path::new(raw))
            .map_err(|e| Error::InvalidOrigin(format!("{}: {}", raw, e)))?;
        Ok(Origin::Local(path))
    }

    /// Restore an origin from its persisted form; no origin means the index
    pub fn from_record(record: Option<&str>) -> Result<Self> {
        match record {
            None => Ok(Origin::Index),
            Some(raw) => Self::parse(raw),
        }
    }

    /// Persisted form of this origin (`None` for index packages)
    pub fn to_record(&self) -> Option<String> {
        match self {
            Origin::Index => None,
            Origin::Local(path) => Some(
                Url::from_file_path(path)
                    .map(String::from)
                    .unwrap_or_else(|_| path.display().to_string()),
            ),
            Origin::Git { url, reference: Some(r) } => Some(format!("{}@{}", url, r)),
            Origin::Git { url, reference: None } => Some(url.to_string()),
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Origin::Index)
    }

    /// Package name implied by the origin (repository or directory name)
    pub fn derived_name(&self) -> Result<PackageName> {
        let candidate = match self {
            Origin::Index => None,
            Origin::Local(path) => path.file_name().and_then(|n| n.to_str()).map(str::to_string),
            Origin::Git { url, .. } => url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .and_then(|last| last.split('.').next())
                .map(str::to_string),
        };

        match candidate {
            Some(name) => PackageName::new(&name),
            None => Err(Error::InvalidOrigin(format!(
                "cannot derive a package name from {}",
                self
            ))),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_record() {
            Some(record) => f.write_str(&record),
            None => f.write_str("index"),
        }
    }
}

/// Split `https://host/path[@ref]` into URL and ref.
///
/// Only an `@` inside the path counts as a ref separator, so user info in
/// the authority (`https://user@host/...`) is left alone.
fn parse_git(raw: &str) -> Result<Origin> {
    let scheme_end = raw.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = raw[scheme_end..].find('/').map(|i| scheme_end + i);
    let at = path_start.and_then(|start| raw[start..].find('@').map(|i| start + i));

    let (url_part, reference) = match at {
        Some(at) => {
            let reference = raw[at + 1..].trim();
            if reference.is_empty() {
                return Err(Error::InvalidOrigin(format!("{}: empty ref", raw)));
            }
            (&raw[..at], Some(reference.to_string()))
        }
        None => (raw, None),
    };

    let url = Url::parse(url_part).map_err(|e| Error::InvalidOrigin(format!("{}: {}", raw, e)))?;
    Ok(Origin::Git { url, reference })
}

/// A requested package: a name plus the origin to resolve it from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    pub name: PackageName,
    pub origin: Origin,
}

impl PackageSpec {
    pub fn new(name: PackageName, origin: Origin) -> Self {
        Self { name, origin }
    }

    /// Spec for a package from the index
    pub fn index(name: PackageName) -> Self {
        Self::new(name, Origin::Index)
    }

    /// Parse a command-line package argument
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if let Ok(name) = PackageName::new(raw) {
            return Ok(Self::index(name));
        }

        if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("file://") {
            let origin = Origin::parse(raw)?;
            return Ok(Self::new(origin.derived_name()?, origin));
        }

        if let Some((name, origin)) = raw.split_once('@')
            && !name.contains('/')
            && !name.contains(':')
        {
            let name = PackageName::new(name)?;
            let origin = Origin::parse(origin)?;
            return Ok(Self::new(name, origin));
        }

        if raw.contains('/') || raw.starts_with('.') {
            let origin = Origin::parse(raw)?;
            return Ok(Self::new(origin.derived_name()?, origin));
        }

        Err(Error::InvalidName(raw.to_string()))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin.to_record() {
            Some(origin) => write!(f, "{} @ {}", self.name, origin),
            None => write!(f, "{}", self.name),
        }
    }
}
