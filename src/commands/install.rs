// src/commands/install.rs
//! Package installation command

use super::progress;
use super::Session;
use anyhow::{Context, Result};
use foampm::orchestrator::{Orchestrator, Outcome, Report};
use foampm::package::PackageSpec;
use foampm::resolver::{InstallPlan, ResolveOptions};
use foampm::source::SystemSource;
use foampm::state::{InstalledState, StateStore};
use tracing::info;

/// Arguments of `foampm install`
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub packages: Vec<String>,
    pub upgrade: bool,
    pub force: bool,
    pub jobs: Option<usize>,
    pub index_url: Option<String>,
    pub dry_run: bool,
}

/// Install packages and their dependencies
pub async fn cmd_install(args: InstallArgs) -> Result<()> {
    let specs = args
        .packages
        .iter()
        .map(|raw| PackageSpec::parse(raw).with_context(|| format!("Invalid package '{}'", raw)))
        .collect::<Result<Vec<_>>>()?;

    let session = Session::open(args.jobs, args.index_url.as_deref())?;
    let _lock = session.lock_exclusive()?;

    let source = SystemSource::new(&session.config, session.platform.clone())
        .context("Failed to set up package source")?;
    let options = ResolveOptions {
        upgrade: args.upgrade,
        force: args.force,
    };

    info!("Resolving {} requested packages", specs.len());
    let orchestrator = Orchestrator::new(&source, &session.store).with_jobs(session.config.jobs);
    let plan = orchestrator
        .plan(&specs, options)
        .await
        .context("Failed to resolve dependencies")?;

    if plan.is_satisfied() {
        for root in plan.roots() {
            println!("Package '{}' is already up to date.", root);
        }
        return Ok(());
    }

    print_plan(&plan);
    if args.dry_run {
        println!();
        println!("Dry run: no changes made.");
        return Ok(());
    }

    let report = orchestrator
        .with_progress(progress::tracker("Installing"))
        .apply(&plan)
        .await;

    let installed = session
        .store
        .load()
        .context("Failed to read installed state")?;
    print_report(&report, &installed);

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} package(s) failed to install", failed);
    }
    Ok(())
}

fn print_plan(plan: &InstallPlan) {
    println!("The following packages will be changed:");
    for entry in plan.actionable() {
        println!("  {:<10} {}", entry.reason.as_str(), entry.descriptor);
    }
}

fn print_report(report: &Report, installed: &InstalledState) {
    for (name, outcome) in report.outcomes() {
        match outcome {
            Outcome::Satisfied => {}
            Outcome::Failed { .. } | Outcome::DependencyFailed { .. } => {
                eprintln!("Package '{}' {}", name, outcome);
            }
            _ => {
                println!("Package '{}' {} successfully.", name, outcome);
                if let Some(record) = installed.get(name.as_str()) {
                    if !record.libs.is_empty() {
                        println!("  New libraries: {}", record.libs.join(", "));
                    }
                    if !record.apps.is_empty() {
                        println!("  New applications: {}", record.apps.join(", "));
                    }
                }
            }
        }
    }
}
