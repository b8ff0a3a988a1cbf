// src/commands/freeze.rs
//! Installed package listing

use super::Session;
use anyhow::{Context, Result};
use foampm::state::{InstalledRecord, StateStore};

/// Print one line per installed package
pub fn cmd_freeze() -> Result<()> {
    let session = Session::open(None, None)?;
    let _lock = session.lock_shared()?;

    let installed = session
        .store
        .load()
        .context("Failed to read installed state")?;

    for record in installed.records() {
        println!("{}", freeze_line(record));
    }
    Ok(())
}

/// `name`, or `name @ origin` for packages not from the index
fn freeze_line(record: &InstalledRecord) -> String {
    match &record.origin {
        Some(origin) => format!("{} @ {}", record.name, origin),
        None => record.name.to_string(),
    }
}
