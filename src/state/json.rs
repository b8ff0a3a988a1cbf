// src/state/json.rs

//! JSON-file backed installed-state store
//!
//! File layout:
//!
//! ```text
//! {
//!   "version": 1,
//!   "packages": {
//!     "solver": {"sha": "3f2a...", "requires": ["core"], "apps": ["solverFoam"], "libs": ["libsolver.so"]}
//!   }
//! }
//! ```
//!
//! Every mutation rewrites the whole file through a temp file in the same
//! directory and an atomic rename, so readers never see a partial write and
//! a crash keeps the previous contents.

use super::{InstalledRecord, InstalledState, StateStore};
use crate::error::{Error, Result};
use crate::package::{ContentIdentity, PackageName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

/// Current on-disk format version
pub const STATE_FORMAT_VERSION: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u64,
    #[serde(default)]
    packages: BTreeMap<String, RecordEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    apps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    libs: Vec<String>,
}

impl RecordEntry {
    fn into_record(self, name: &str) -> Result<InstalledRecord> {
        let dependencies = self
            .requires
            .iter()
            .map(|dep| PackageName::new(dep))
            .collect::<Result<Vec<_>>>()?;

        Ok(InstalledRecord {
            name: PackageName::new(name)?,
            identity: self.sha.map(ContentIdentity::new),
            dependencies,
            origin: self.origin,
            apps: self.apps,
            libs: self.libs,
        })
    }

    fn from_record(record: &InstalledRecord) -> Self {
        Self {
            sha: record.identity.as_ref().map(|i| i.as_str().to_string()),
            requires: record.dependencies.iter().map(|d| d.to_string()).collect(),
            origin: record.origin.clone(),
            apps: record.apps.clone(),
            libs: record.libs.clone(),
        }
    }
}

/// Installed-state store persisted as a JSON document
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, action: &str, e: impl std::fmt::Display) -> Error {
        Error::StoreUnavailable(format!("{} {}: {}", action, self.path.display(), e))
    }

    fn read(&self) -> Result<InstalledState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(InstalledState::new()),
            Err(e) => return Err(self.unavailable("failed to read", e)),
        };

        if content.trim().is_empty() {
            return Ok(InstalledState::new());
        }

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| self.unavailable("failed to parse", e))?;
        let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
        if version != STATE_FORMAT_VERSION {
            return Err(Error::UnsupportedStateVersion(version));
        }

        let file: StateFile =
            serde_json::from_value(value).map_err(|e| self.unavailable("failed to parse", e))?;

        let records = file
            .packages
            .into_iter()
            .map(|(name, entry)| entry.into_record(&name))
            .collect::<Result<Vec<_>>>()?;

        Ok(InstalledState::from_records(records))
    }

    fn write(&self, state: &InstalledState) -> Result<()> {
        if state.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.unavailable("failed to remove", e)),
            };
        }

        let file = StateFile {
            version: STATE_FORMAT_VERSION,
            packages: state
                .records()
                .map(|record| (record.name.to_string(), RecordEntry::from_record(record)))
                .collect(),
        };

        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| self.unavailable("failed to create directory for", e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.unavailable("failed to stage", e))?;
        serde_json::to_writer_pretty(&mut tmp, &file).map_err(|e| self.unavailable("failed to encode", e))?;
        tmp.write_all(b"\n").map_err(|e| self.unavailable("failed to write", e))?;
        tmp.as_file().sync_all().map_err(|e| self.unavailable("failed to sync", e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.unavailable("failed to replace", e.error))?;

        debug!("Wrote installed state ({} packages) to {:?}", state.len(), self.path);
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut InstalledState) -> T) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::StoreUnavailable("state write lock poisoned".to_string()))?;

        let mut state = self.read()?;
        let result = f(&mut state);
        self.write(&state)?;
        Ok(result)
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<InstalledState> {
        self.read()
    }

    fn commit(&self, record: InstalledRecord) -> Result<()> {
        let name = record.name.clone();
        self.modify(|state| state.insert(record))?;
        debug!("Committed installed record for {}", name);
        Ok(())
    }

    fn remove(&self, name: &PackageName) -> Result<bool> {
        let existed = self.modify(|state| state.remove(name.as_str()).is_some())?;
        if existed {
            debug!("Removed installed record for {}", name);
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    fn setup() -> (tempfile::TempDir, JsonStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("state").join("installed.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = setup();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_empty() {
        let (_dir, store) = setup();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_commit_and_reload() {
        let (_dir, store) = setup();
        let record = InstalledRecord::new(name("solver"))
            .with_identity("abc123")
            .with_dependencies([name("core")])
            .with_artifacts(vec!["solverFoam".into()], vec!["libsolver.so".into()]);
        store.commit(record.clone()).unwrap();

        let reopened = JsonStateStore::new(store.path());
        let state = reopened.load().unwrap();
        assert_eq!(state.get("solver"), Some(&record));
    }

    #[test]
    fn test_file_format() {
        let (_dir, store) = setup();
        store
            .commit(InstalledRecord::new(name("core")).with_identity("deadbeef"))
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["packages"]["core"]["sha"], "deadbeef");
        assert!(value["packages"]["core"].get("requires").is_none());
    }

    #[test]
    fn test_remove_last_record_deletes_file() {
        let (_dir, store) = setup();
        store.commit(InstalledRecord::new(name("a"))).unwrap();
        assert!(store.path().exists());

        assert!(store.remove(&name("a")).unwrap());
        assert!(!store.path().exists());
        assert!(!store.remove(&name("a")).unwrap());
    }

    #[test]
    fn test_remove_leaves_others() {
        let (_dir, store) = setup();
        store.commit(InstalledRecord::new(name("a")).with_identity("1")).unwrap();
        store.commit(InstalledRecord::new(name("b")).with_identity("2")).unwrap();

        store.remove(&name("a")).unwrap();
        let state = store.load().unwrap();
        assert!(!state.contains("a"));
        assert_eq!(
            state.get("b").and_then(|r| r.identity.clone()),
            Some(ContentIdentity::new("2"))
        );
    }

    #[test]
    fn test_newer_version_rejected() {
        let (_dir, store) = setup();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"version": 2, "packages": {}}"#).unwrap();
        assert!(matches!(store.load(), Err(Error::UnsupportedStateVersion(2))));
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let (_dir, store) = setup();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_concurrent_commits() {
        let (_dir, store) = setup();
        let store = std::sync::Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .commit(InstalledRecord::new(name(&format!("pkg{}", i))).with_identity("x"))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap().len(), 8);
    }
}
