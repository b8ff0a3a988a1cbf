// src/source/mod.rs

//! Package sources
//!
//! The resolver and orchestrator never talk to the network or the build
//! tools directly. They go through the [`PackageSource`] capability, which
//! knows how to describe a package, fetch its sources, build it and remove
//! what a build installed. [`SystemSource`] is the real implementation; any
//! other type implementing the trait (a test double, a dry-run source) can
//! stand in for it.

mod build;
mod git;
mod index;
mod local;
mod platform;
mod process;
mod system;

pub use build::{ArtifactSnapshot, Builder};
pub use index::IndexClient;
pub use platform::Platform;
pub use process::{run, CommandOutput};
pub use system::SystemSource;

use crate::error::Result;
use crate::package::{ContentIdentity, PackageDescriptor, PackageSpec};
use crate::state::InstalledRecord;
use async_trait::async_trait;

/// Files a build placed into the platform directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArtifacts {
    /// Executables, relative to the platform `bin` directory
    pub apps: Vec<String>,
    /// Libraries, relative to the platform `lib` directory
    pub libs: Vec<String>,
}

impl BuildArtifacts {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty() && self.libs.is_empty()
    }
}

/// Capability to describe, fetch, build and remove packages
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Resolve a spec into a descriptor
    ///
    /// The returned descriptor carries the same name as the spec. An unknown
    /// package is `Error::PackageNotFound`.
    async fn describe(&self, spec: &PackageSpec) -> Result<PackageDescriptor>;

    /// Make the package's sources available locally
    ///
    /// Returns the content identity of the fetched revision, if known.
    async fn fetch(&self, descriptor: &PackageDescriptor) -> Result<Option<ContentIdentity>>;

    /// Build previously fetched sources and report what was installed
    async fn build(&self, descriptor: &PackageDescriptor) -> Result<BuildArtifacts>;

    /// Delete the files a previous build installed
    ///
    /// With `keep_sources` the local source checkout is left in place so a
    /// following rebuild does not need to download it again.
    async fn remove_artifacts(&self, record: &InstalledRecord, keep_sources: bool) -> Result<()>;
}
