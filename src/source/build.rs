// src/source/build.rs

//! Building fetched sources
//!
//! Build steps are shell commands run in the package's source directory.
//! What a package installs is not declared anywhere, so it is discovered by
//! comparing modification times under the platform `bin` and `lib`
//! directories before and after the build. Builds therefore run one at a
//! time: two concurrent builds would claim each other's files.

use super::platform::Platform;
use super::process::run;
use super::BuildArtifacts;
use crate::error::{Error, Result};
use crate::package::PackageDescriptor;
use crate::state::InstalledRecord;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Environment variable pointing builds at their dependencies' sources
pub const DEPENDENCIES_ENV: &str = "OPI_DEPENDENCIES";

const SHELL: &str = "/bin/bash";

/// Modification times of the files in the platform directories
#[derive(Debug, Clone)]
pub struct ArtifactSnapshot {
    bin_dir: PathBuf,
    lib_dir: PathBuf,
    files: HashMap<PathBuf, SystemTime>,
}

impl ArtifactSnapshot {
    pub fn capture(platform: &Platform) -> io::Result<Self> {
        let bin_dir = platform.bin_dir();
        let lib_dir = platform.lib_dir();

        let mut files = HashMap::new();
        for dir in [&bin_dir, &lib_dir] {
            scan(dir, &mut files)?;
        }

        Ok(Self {
            bin_dir,
            lib_dir,
            files,
        })
    }

    /// Files that appeared or changed since the snapshot was taken
    pub fn changes(&self) -> io::Result<BuildArtifacts> {
        let mut current = HashMap::new();
        scan(&self.bin_dir, &mut current)?;
        scan(&self.lib_dir, &mut current)?;

        let mut artifacts = BuildArtifacts::default();
        for (path, modified) in current {
            if self.files.get(&path) == Some(&modified) {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.bin_dir) {
                artifacts.apps.push(relative.to_string_lossy().into_owned());
            } else if let Ok(relative) = path.strip_prefix(&self.lib_dir) {
                artifacts.libs.push(relative.to_string_lossy().into_owned());
            }
        }

        artifacts.apps.sort();
        artifacts.libs.sort();
        Ok(artifacts)
    }
}

fn scan(dir: &Path, files: &mut HashMap<PathBuf, SystemTime>) -> io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            let modified = entry.metadata().map_err(io::Error::other)?.modified()?;
            files.insert(entry.into_path(), modified);
        }
    }
    Ok(())
}

/// Runs build steps and removes what builds installed
#[derive(Debug)]
pub struct Builder {
    platform: Platform,
    packages_dir: PathBuf,
    lock: Mutex<()>,
}

impl Builder {
    pub fn new(platform: Platform, packages_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            packages_dir: packages_dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Directory holding the sources of all packages
    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    /// Source directory of one package
    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.packages_dir.join(name)
    }

    /// Run the package's build steps in its source directory
    ///
    /// On failure every file the build touched is deleted along with the
    /// source directory.
    pub async fn build(&self, descriptor: &PackageDescriptor) -> Result<BuildArtifacts> {
        let name = descriptor.name.as_str();
        let failed = |cause: String| Error::BuildFailed {
            package: name.to_string(),
            cause,
        };

        let steps = descriptor.metadata.build_steps(name)?;
        let dir = self.source_dir(name);
        if !dir.is_dir() {
            return Err(failed(format!("sources not found in {}", dir.display())));
        }

        let mut envs = Vec::new();
        if !descriptor.dependencies.is_empty() {
            envs.push((DEPENDENCIES_ENV, self.packages_dir.to_string_lossy().into_owned()));
        }

        let _guard = self.lock.lock().await;

        let snapshot = ArtifactSnapshot::capture(&self.platform)
            .map_err(|e| failed(format!("failed to scan platform directories: {}", e)))?;

        let mut outcome = Ok(());
        for step in &steps {
            info!("{}: running '{}'", name, step);
            outcome = match run(SHELL, ["-c", step.as_str()], Some(&dir), &envs).await {
                Ok(output) => output.check(&format!("'{}'", step)).map(|_| ()),
                Err(e) => Err(format!("failed to run '{}': {}", step, e)),
            };
            if outcome.is_err() {
                break;
            }
        }

        let artifacts = snapshot
            .changes()
            .map_err(|e| failed(format!("failed to scan platform directories: {}", e)))?;

        if let Err(cause) = outcome {
            warn!("Build of {} failed, removing partial results", name);
            let leftovers = self
                .delete_files(&artifacts.apps, &artifacts.libs)
                .into_iter()
                .chain(remove_dir(&dir));
            for leftover in leftovers {
                warn!("{}", leftover);
            }
            return Err(failed(cause));
        }

        debug!(
            "{} installed {} apps and {} libs",
            name,
            artifacts.apps.len(),
            artifacts.libs.len()
        );
        Ok(artifacts)
    }

    /// Delete an installed package's files
    ///
    /// Files already gone are fine. Any other failure is reported after
    /// everything else has been attempted.
    pub fn remove_artifacts(&self, record: &InstalledRecord, keep_sources: bool) -> Result<()> {
        let mut failures = self.delete_files(&record.apps, &record.libs);
        if !keep_sources {
            failures.extend(remove_dir(&self.source_dir(record.name.as_str())));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::RemoveFailed {
                package: record.name.to_string(),
                cause: failures.join("; "),
            })
        }
    }

    /// Delete files under the platform directories, returning what could not be removed
    fn delete_files(&self, apps: &[String], libs: &[String]) -> Vec<String> {
        let bin_dir = self.platform.bin_dir();
        let lib_dir = self.platform.lib_dir();
        let paths = apps
            .iter()
            .map(|app| bin_dir.join(app))
            .chain(libs.iter().map(|lib| lib_dir.join(lib)));

        let mut failures = Vec::new();
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {:?}", path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("failed to remove {}: {}", path.display(), e)),
            }
        }
        failures
    }
}

fn remove_dir(dir: &Path) -> Option<String> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!("Removed {:?}", dir);
            None
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => Some(format!("failed to remove {}: {}", dir.display(), e)),
    }
}
