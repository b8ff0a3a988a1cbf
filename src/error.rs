// src/error.rs

//! Error types for foampm
//!
//! Resolution errors (`CycleDetected`, `PackageNotFound`) abort a whole run
//! before anything is installed. Fetch, build, removal and store errors are
//! per package and are contained by the orchestrator.

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, installing or removing packages
#[derive(Debug, Error)]
pub enum Error {
    /// Dependency cycle, as the path from the repeated package back to itself
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Package '{name}' not found")]
    PackageNotFound { name: String },

    #[error("Invalid package name: {0}")]
    InvalidName(String),

    #[error("Invalid package origin: {0}")]
    InvalidOrigin(String),

    /// Same package requested more than once with conflicting origins
    #[error("Duplicate or conflicting package names: {0}")]
    DuplicatePackage(String),

    #[error("Package '{package}' is not compatible with this installation: {reason}")]
    Incompatible { package: String, reason: String },

    #[error("Package '{package}' uses an unsupported build system: {build}")]
    UnsupportedBuildSystem { package: String, build: String },

    #[error("Failed to fetch package '{package}': {cause}")]
    FetchFailed { package: String, cause: String },

    #[error("Failed to build package '{package}': {cause}")]
    BuildFailed { package: String, cause: String },

    /// Installed files that exist but could not be deleted
    #[error("Failed to remove package '{package}': {cause}")]
    RemoveFailed { package: String, cause: String },

    /// Installed-state storage could not be read or written
    #[error("Installed state unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Installed state file has unsupported version {0}; please upgrade foampm")]
    UnsupportedStateVersion(u64),

    #[error("Cannot uninstall '{package}': required by {}", dependents.join(", "))]
    RequiredBy {
        package: String,
        dependents: Vec<String>,
    },

    /// The toolkit environment is missing or inconsistent
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error aborts resolution as a whole
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::CycleDetected { .. }
                | Error::PackageNotFound { .. }
                | Error::DuplicatePackage(_)
                | Error::Incompatible { .. }
                | Error::UnsupportedBuildSystem { .. }
        )
    }
}
