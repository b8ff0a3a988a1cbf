// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use foampm::package::{ContentIdentity, Origin, PackageDescriptor, PackageName, PackageSpec};
use foampm::source::{BuildArtifacts, PackageSource};
use foampm::state::{InstalledRecord, InstalledState, MemoryStateStore, StateStore};
use foampm::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn name(s: &str) -> PackageName {
    PackageName::new(s).unwrap()
}

pub fn spec(s: &str) -> PackageSpec {
    PackageSpec::index(name(s))
}

/// In-memory package source
///
/// Packages are registered with their dependencies and a content identity.
/// Every describe, fetch, build and removal is recorded so tests can check
/// what ran and in which order.
#[derive(Default)]
pub struct MockSource {
    packages: Mutex<HashMap<String, PackageDescriptor>>,
    failing_builds: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<String>>,
    failing_removals: Mutex<HashSet<String>>,
    described: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
    built: Mutex<Vec<String>>,
    removed: Mutex<Vec<(String, bool)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package with identity `rev1`
    pub fn with_package(self, pkg: &str, deps: &[&str]) -> Self {
        self.add(pkg, deps, "rev1");
        self
    }

    /// Register or replace a package
    pub fn add(&self, pkg: &str, deps: &[&str], identity: &str) {
        let descriptor = PackageDescriptor::new(name(pkg), Origin::Index)
            .with_dependencies(deps.iter().map(|d| name(d)))
            .with_identity(Some(ContentIdentity::new(identity)));
        self.packages.lock().unwrap().insert(pkg.to_string(), descriptor);
    }

    pub fn fail_build(&self, pkg: &str) {
        self.failing_builds.lock().unwrap().insert(pkg.to_string());
    }

    pub fn fail_fetch(&self, pkg: &str) {
        self.failing_fetches.lock().unwrap().insert(pkg.to_string());
    }

    pub fn fail_remove(&self, pkg: &str) {
        self.failing_removals.lock().unwrap().insert(pkg.to_string());
    }

    pub fn described(&self) -> Vec<String> {
        self.described.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<(String, bool)> {
        self.removed.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.described.lock().unwrap().clear();
        self.fetched.lock().unwrap().clear();
        self.built.lock().unwrap().clear();
        self.removed.lock().unwrap().clear();
    }
}

#[async_trait]
impl PackageSource for MockSource {
    async fn describe(&self, spec: &PackageSpec) -> Result<PackageDescriptor> {
        self.described.lock().unwrap().push(spec.name.to_string());
        self.packages
            .lock()
            .unwrap()
            .get(spec.name.as_str())
            .cloned()
            .ok_or_else(|| Error::PackageNotFound {
                name: spec.name.to_string(),
            })
    }

    async fn fetch(&self, descriptor: &PackageDescriptor) -> Result<Option<ContentIdentity>> {
        let pkg = descriptor.name.to_string();
        self.fetched.lock().unwrap().push(pkg.clone());
        if self.failing_fetches.lock().unwrap().contains(&pkg) {
            return Err(Error::FetchFailed {
                package: pkg,
                cause: "connection refused".to_string(),
            });
        }
        Ok(descriptor.identity.clone())
    }

    async fn build(&self, descriptor: &PackageDescriptor) -> Result<BuildArtifacts> {
        let pkg = descriptor.name.to_string();
        self.built.lock().unwrap().push(pkg.clone());
        if self.failing_builds.lock().unwrap().contains(&pkg) {
            return Err(Error::BuildFailed {
                package: pkg,
                cause: "wmake: error 1".to_string(),
            });
        }
        Ok(BuildArtifacts {
            apps: Vec::new(),
            libs: vec![format!("lib{}.so", pkg)],
        })
    }

    async fn remove_artifacts(&self, record: &InstalledRecord, keep_sources: bool) -> Result<()> {
        self.removed
            .lock()
            .unwrap()
            .push((record.name.to_string(), keep_sources));
        if self.failing_removals.lock().unwrap().contains(record.name.as_str()) {
            return Err(Error::RemoveFailed {
                package: record.name.to_string(),
                cause: "Permission denied".to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory state store whose commits fail for chosen packages
///
/// Loads and removals behave like `MemoryStateStore`.
#[derive(Default)]
pub struct FailingCommitStore {
    inner: MemoryStateStore,
    failing: Mutex<HashSet<String>>,
}

impl FailingCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commit(&self, pkg: &str) {
        self.failing.lock().unwrap().insert(pkg.to_string());
    }
}

impl StateStore for FailingCommitStore {
    fn load(&self) -> Result<InstalledState> {
        self.inner.load()
    }

    fn commit(&self, record: InstalledRecord) -> Result<()> {
        if self.failing.lock().unwrap().contains(record.name.as_str()) {
            return Err(Error::StoreUnavailable("disk full".to_string()));
        }
        self.inner.commit(record)
    }

    fn remove(&self, name: &PackageName) -> Result<bool> {
        self.inner.remove(name)
    }
}
