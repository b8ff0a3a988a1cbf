// src/commands/uninstall.rs
//! Package removal command

use super::progress;
use super::Session;
use anyhow::{Context, Result};
use foampm::orchestrator::{Orchestrator, Outcome};
use foampm::package::PackageSpec;
use foampm::source::SystemSource;

/// Uninstall packages
///
/// Packages may be given in any form `install` accepts; only the name is
/// used.
pub async fn cmd_uninstall(packages: &[String]) -> Result<()> {
    let names = packages
        .iter()
        .map(|raw| {
            PackageSpec::parse(raw)
                .map(|spec| spec.name)
                .with_context(|| format!("Invalid package '{}'", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    let session = Session::open(None, None)?;
    let _lock = session.lock_exclusive()?;

    let source = SystemSource::new(&session.config, session.platform.clone())
        .context("Failed to set up package source")?;

    let report = Orchestrator::new(&source, &session.store)
        .with_progress(progress::tracker("Uninstalling"))
        .uninstall(&names)
        .await?;

    for (name, outcome) in report.outcomes() {
        match outcome {
            Outcome::Removed => println!("Package '{}' uninstalled successfully.", name),
            Outcome::AlreadyAbsent => eprintln!("Warning: skipping package '{}' as it is not installed.", name),
            other => eprintln!("Package '{}' {}", name, other),
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} package(s) failed to uninstall", failed);
    }
    Ok(())
}
