// src/source/platform.rs

//! Simulation toolkit environment
//!
//! Packages install their executables and libraries into the user platform
//! directories of the active toolkit environment. Both directories share a
//! common parent, the platform directory, which also holds foampm's state.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

const ACTIVATE_HINT: &str = "activate (source) the toolkit environment first";

/// Active toolkit environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    root: PathBuf,
    toolkit_version: u32,
}

impl Platform {
    pub fn new(root: impl Into<PathBuf>, toolkit_version: u32) -> Self {
        Self {
            root: root.into(),
            toolkit_version,
        }
    }

    /// Detect the platform from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Detect the platform through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let (Some(app_bin), Some(lib_bin)) = (lookup("FOAM_USER_APPBIN"), lookup("FOAM_USER_LIBBIN"))
        else {
            return Err(Error::Environment(format!(
                "no toolkit environment found; {}",
                ACTIVATE_HINT
            )));
        };

        let app_bin = PathBuf::from(app_bin);
        let lib_bin = PathBuf::from(lib_bin);

        let root = match (app_bin.parent(), lib_bin.parent()) {
            (Some(a), Some(l)) if a == l => a.to_path_buf(),
            _ => {
                return Err(Error::Environment(format!(
                    "FOAM_USER_APPBIN ({}) and FOAM_USER_LIBBIN ({}) do not share a platform directory",
                    app_bin.display(),
                    lib_bin.display()
                )));
            }
        };

        if app_bin != root.join("bin") || lib_bin != root.join("lib") {
            return Err(Error::Environment(format!(
                "unexpected platform layout under {}: expected bin/ and lib/",
                root.display()
            )));
        }

        let raw_version = lookup("WM_PROJECT_VERSION").ok_or_else(|| {
            Error::Environment(format!("WM_PROJECT_VERSION is not set; {}", ACTIVATE_HINT))
        })?;

        Ok(Self::new(root, parse_toolkit_version(&raw_version)?))
    }

    /// Platform directory (parent of `bin` and `lib`)
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    /// Numeric toolkit version (`2406` for `v2406`, `12` for `12`)
    pub fn toolkit_version(&self) -> u32 {
        self.toolkit_version
    }
}

/// Parse `v2406` or `12` style version strings
fn parse_toolkit_version(raw: &str) -> Result<u32> {
    let digits = raw.trim().strip_prefix('v').unwrap_or(raw.trim());
    digits
        .parse()
        .map_err(|_| Error::Environment(format!("unrecognized toolkit version '{}'", raw)))
}
