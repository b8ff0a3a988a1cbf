// src/lib.rs

//! foampm
//!
//! Community package manager for simulation toolkit add-ons. Packages are
//! built from source into the user's platform directories, so installing one
//! means fetching it, fetching and building everything it depends on first,
//! and rebuilding whatever already depends on it.
//!
//! # Architecture
//!
//! - `package`: names, origins and descriptors of installable packages
//! - `resolver`: dependency-first install plans with cycle detection
//! - `orchestrator`: concurrent fetch and build of a plan, uninstall
//! - `state`: durable record of what is installed
//! - `source`: where packages come from and how they are built
//!
//! The resolver and orchestrator only see the [`PackageSource`] and
//! [`StateStore`] traits, so both can run against in-memory doubles.

pub mod config;
mod error;
pub mod orchestrator;
pub mod package;
pub mod progress;
pub mod resolver;
pub mod source;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, Outcome, Report};
pub use package::{ContentIdentity, Origin, PackageDescriptor, PackageName, PackageSpec};
pub use progress::{CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use resolver::{resolve, DependencyGraph, InstallPlan, InstallReason, PlanEntry, ResolveOptions, Resolver};
pub use source::{BuildArtifacts, PackageSource, Platform, SystemSource};
pub use state::{InstalledRecord, InstalledState, JsonStateStore, MemoryStateStore, StateLock, StateStore};
