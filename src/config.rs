// src/config.rs

//! Runtime configuration
//!
//! Defaults can be overridden through `FOAMPM_*` environment variables;
//! command-line flags override both.

use crate::error::{Error, Result};
use crate::source::Platform;
use std::path::PathBuf;

/// Package index used when `FOAMPM_INDEX_URL` is not set
pub const DEFAULT_INDEX_URL: &str = "https://raw.githubusercontent.com/exasim-project/opi/main";

/// File holding the installed state, inside the state directory
pub const STATE_FILE: &str = "installed.json";

/// Advisory lock file, inside the state directory
pub const LOCK_FILE: &str = "foampm.lock";

/// foampm configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the package index
    pub index_url: String,

    /// Maximum number of packages fetched and built concurrently
    pub jobs: usize,

    /// Directory for the installed state and package sources
    pub state_dir: PathBuf,
}

impl Config {
    /// Configuration with default values and the given state directory
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            jobs: num_cpus(),
            state_dir: state_dir.into(),
        }
    }

    /// Load configuration for a platform from the process environment
    pub fn from_env(platform: &Platform) -> Result<Self> {
        Self::from_lookup(platform, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(platform: &Platform, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let state_dir = lookup("FOAMPM_STATE_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| platform.root().join("foampm"));

        let mut config = Self::new(state_dir);

        if let Some(url) = lookup("FOAMPM_INDEX_URL").filter(|url| !url.is_empty()) {
            config.index_url = url;
        }

        if let Some(raw) = lookup("FOAMPM_JOBS") {
            let jobs = raw
                .trim()
                .parse()
                .map_err(|_| Error::Environment(format!("FOAMPM_JOBS must be a positive number, got '{}'", raw)))?;
            config = config.with_jobs(jobs);
        }

        Ok(config)
    }

    /// Set the concurrency bound; zero is treated as one
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    /// Path of the installed-state file
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Path of the process lock file
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    /// Directory holding package source checkouts
    pub fn packages_dir(&self) -> PathBuf {
        self.state_dir.join("pkg")
    }
}

/// Number of CPUs available to this process
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}
