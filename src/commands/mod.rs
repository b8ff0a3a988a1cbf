// src/commands/mod.rs
//! Command handlers for the foampm CLI

mod freeze;
mod install;
pub mod progress;
mod uninstall;

pub use freeze::cmd_freeze;
pub use install::{cmd_install, InstallArgs};
pub use uninstall::cmd_uninstall;

use anyhow::{Context, Result};
use foampm::config::Config;
use foampm::source::Platform;
use foampm::state::{JsonStateStore, StateLock};

/// Platform, configuration and state store for one command run
pub struct Session {
    pub platform: Platform,
    pub config: Config,
    pub store: JsonStateStore,
}

impl Session {
    /// Detect the toolkit environment and load the configuration
    ///
    /// Command-line values take precedence over the environment.
    pub fn open(jobs: Option<usize>, index_url: Option<&str>) -> Result<Self> {
        let platform = Platform::from_env()?;
        let mut config = Config::from_env(&platform)?;
        if let Some(jobs) = jobs {
            config = config.with_jobs(jobs);
        }
        if let Some(url) = index_url {
            config = config.with_index_url(url);
        }

        let store = JsonStateStore::new(config.state_file());
        Ok(Self {
            platform,
            config,
            store,
        })
    }

    /// Take the process lock for a mutating command
    pub fn lock_exclusive(&self) -> Result<StateLock> {
        StateLock::exclusive(self.config.lock_file()).context("Failed to lock installed state")
    }

    /// Take the process lock for a read-only command
    pub fn lock_shared(&self) -> Result<Option<StateLock>> {
        // Nothing installed yet and nothing to lock
        if !self.config.state_dir.exists() {
            return Ok(None);
        }
        let lock = StateLock::shared(self.config.lock_file()).context("Failed to lock installed state")?;
        Ok(Some(lock))
    }
}
