// src/state/mod.rs

//! Installed-state tracking
//!
//! The installed state maps each installed package name to an
//! [`InstalledRecord`]: the content identity and dependency list the package
//! had when it was built, plus the files the build produced. A record exists
//! iff the package is currently installed.
//!
//! Stores commit one record at a time and every call is durable before it
//! returns, so a run interrupted halfway leaves a consistent state that the
//! next run can pick up from.

mod json;
mod lock;

pub use json::JsonStateStore;
pub use lock::StateLock;

use crate::error::{Error, Result};
use crate::package::{ContentIdentity, Origin, PackageDescriptor, PackageName, PackageSpec};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Snapshot of one installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRecord {
    pub name: PackageName,
    /// Content identity at install time (`None` for local directories)
    pub identity: Option<ContentIdentity>,
    /// Dependencies declared at install time
    pub dependencies: Vec<PackageName>,
    /// Persisted origin; `None` for index packages
    pub origin: Option<String>,
    /// Executables produced by the build, relative to the platform `bin` dir
    pub apps: Vec<String>,
    /// Libraries produced by the build, relative to the platform `lib` dir
    pub libs: Vec<String>,
}

impl InstalledRecord {
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            identity: None,
            dependencies: Vec::new(),
            origin: None,
            apps: Vec::new(),
            libs: Vec::new(),
        }
    }

    /// Record for a freshly built package
    pub fn from_descriptor(descriptor: &PackageDescriptor, identity: Option<ContentIdentity>) -> Self {
        Self {
            name: descriptor.name.clone(),
            identity,
            dependencies: descriptor.dependencies.clone(),
            origin: descriptor.origin.to_record(),
            apps: Vec::new(),
            libs: Vec::new(),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(ContentIdentity::new(identity));
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = PackageName>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Attach build artifacts, kept sorted for stable output
    pub fn with_artifacts(mut self, mut apps: Vec<String>, mut libs: Vec<String>) -> Self {
        apps.sort();
        libs.sort();
        self.apps = apps;
        self.libs = libs;
        self
    }

    pub fn origin(&self) -> Result<Origin> {
        Origin::from_record(self.origin.as_deref())
    }

    /// Spec that resolves this package from the same origin it was installed from
    pub fn spec(&self) -> Result<PackageSpec> {
        Ok(PackageSpec::new(self.name.clone(), self.origin()?))
    }
}

/// Read-only view of the installed packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledState {
    records: BTreeMap<PackageName, InstalledRecord>,
}

impl InstalledState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = InstalledRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&InstalledRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in name order
    pub fn records(&self) -> impl Iterator<Item = &InstalledRecord> {
        self.records.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &PackageName> {
        self.records.keys()
    }

    /// Installed packages whose recorded dependencies include `name`
    pub fn dependents_of(&self, name: &str) -> Vec<&PackageName> {
        self.records
            .values()
            .filter(|record| record.dependencies.iter().any(|dep| dep.as_str() == name))
            .map(|record| &record.name)
            .collect()
    }

    /// Spec to resolve `name`: its recorded origin if installed, else the index
    pub fn spec_for(&self, name: &PackageName) -> Result<PackageSpec> {
        match self.records.get(name) {
            Some(record) => record.spec(),
            None => Ok(PackageSpec::index(name.clone())),
        }
    }

    pub fn insert(&mut self, record: InstalledRecord) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn remove(&mut self, name: &str) -> Option<InstalledRecord> {
        self.records.remove(name)
    }
}

/// Durable storage for installed records
///
/// `commit` and `remove` must be durable before returning. Calls for
/// different names may run concurrently; implementations serialize only
/// the final write.
pub trait StateStore: Send + Sync {
    /// Read the current installed state; missing storage is an empty state
    fn load(&self) -> Result<InstalledState>;

    /// Insert or replace one record
    fn commit(&self, record: InstalledRecord) -> Result<()>;

    /// Delete one record, returning whether it existed
    fn remove(&self, name: &PackageName) -> Result<bool>;
}

/// In-memory store, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<InstalledState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: InstalledState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InstalledState>> {
        self.state
            .lock()
            .map_err(|_| Error::StoreUnavailable("in-memory state lock poisoned".to_string()))
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<InstalledState> {
        Ok(self.lock()?.clone())
    }

    fn commit(&self, record: InstalledRecord) -> Result<()> {
        self.lock()?.insert(record);
        Ok(())
    }

    fn remove(&self, name: &PackageName) -> Result<bool> {
        Ok(self.lock()?.remove(name.as_str()).is_some())
    }
}
