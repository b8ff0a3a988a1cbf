// src/orchestrator/mod.rs

//! Installation orchestration
//!
//! Executes an [`InstallPlan`] against a [`PackageSource`] and a
//! [`StateStore`]. A single coordinating loop keeps up to `jobs` package
//! tasks (fetch, build, commit) in flight:
//!
//! - each actionable entry starts with a count of its actionable
//!   dependencies and is released once that count drops to zero;
//!   already-satisfied entries never hold anything back
//! - a successful task commits its record before its dependents are
//!   released
//! - a failed task cancels every package that depends on it, directly or
//!   transitively, before any of them starts; unrelated tasks keep going
//!
//! Per-package failures end up in the [`Report`]; `apply` itself does not
//! fail.

mod report;

pub use report::{Outcome, Report};

use crate::error::{Error, Result};
use crate::package::{PackageName, PackageSpec};
use crate::progress::{ProgressTracker, SilentProgress};
use crate::resolver::{InstallPlan, InstallReason, PlanEntry, ResolveOptions, Resolver};
use crate::source::PackageSource;
use crate::state::{InstalledRecord, StateStore};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives installs and uninstalls
pub struct Orchestrator<'a> {
    source: &'a dyn PackageSource,
    store: &'a dyn StateStore,
    jobs: usize,
    progress: Arc<dyn ProgressTracker>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(source: &'a dyn PackageSource, store: &'a dyn StateStore) -> Self {
        Self {
            source,
            store,
            jobs: 1,
            progress: Arc::new(SilentProgress::new()),
        }
    }

    /// Maximum number of package tasks in flight; zero is treated as one
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve `roots` against the current installed state and apply the plan
    pub async fn install(&self, roots: &[PackageSpec], options: ResolveOptions) -> Result<Report> {
        let plan = self.plan(roots, options).await?;
        Ok(self.apply(&plan).await)
    }

    /// Resolve `roots` against the current installed state
    pub async fn plan(&self, roots: &[PackageSpec], options: ResolveOptions) -> Result<InstallPlan> {
        let installed = self.store.load()?;
        Resolver::new(self.source, &installed)
            .with_options(options)
            .resolve(roots)
            .await
    }

    /// Execute a plan
    pub async fn apply(&self, plan: &InstallPlan) -> Report {
        let entries = plan.entries();
        let graph = plan.graph();
        let position: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name().as_str(), i))
            .collect();

        let mut outcomes: Vec<Option<Outcome>> = vec![None; entries.len()];
        let mut remaining: Vec<usize> = vec![0; entries.len()];
        let mut ready: VecDeque<usize> = VecDeque::new();

        for (i, entry) in entries.iter().enumerate() {
            if !entry.reason.is_actionable() {
                outcomes[i] = Some(Outcome::Satisfied);
                continue;
            }

            remaining[i] = graph
                .dependencies(entry.name().as_str())
                .iter()
                .filter_map(|dep| position.get(dep.as_str()))
                .filter(|&&dep| entries[dep].reason.is_actionable())
                .count();

            if remaining[i] == 0 {
                ready.push_back(i);
            }
        }

        let actionable = plan.actionable_count();
        self.progress.set_length(actionable as u64);
        info!("Applying plan: {} of {} packages need work", actionable, entries.len());

        let mut in_flight = FuturesUnordered::new();
        let mut failed = 0usize;

        loop {
            while in_flight.len() < self.jobs {
                let Some(i) = ready.pop_front() else {
                    break;
                };
                let entry = &entries[i];
                debug!("Releasing {}", entry.name());
                in_flight.push(async move { (i, self.install_entry(entry).await) });
            }

            let Some((i, result)) = in_flight.next().await else {
                break;
            };
            let name = entries[i].name();
            self.progress.increment(1);

            match result {
                Ok(outcome) => {
                    info!("{}: {}", name, outcome);
                    outcomes[i] = Some(outcome);

                    for dependent in graph.dependents(name.as_str()) {
                        let Some(&d) = position.get(dependent.as_str()) else {
                            continue;
                        };
                        if outcomes[d].is_some() {
                            continue;
                        }
                        remaining[d] = remaining[d].saturating_sub(1);
                        if remaining[d] == 0 {
                            ready.push_back(d);
                        }
                    }
                }
                Err(e) => {
                    warn!("{}: {}", name, e);
                    failed += 1;
                    outcomes[i] = Some(Outcome::Failed { cause: e.to_string() });

                    for dependent in graph.transitive_dependents(name.as_str()) {
                        let Some(&d) = position.get(dependent.as_str()) else {
                            continue;
                        };
                        if outcomes[d].is_none() {
                            debug!("Canceling {}: depends on failed {}", dependent, name);
                            outcomes[d] = Some(Outcome::DependencyFailed {
                                dependency: name.clone(),
                            });
                            self.progress.increment(1);
                        }
                    }
                }
            }
        }

        if failed == 0 {
            self.progress
                .finish_with_message(&format!("{} packages processed", actionable));
        } else {
            self.progress
                .finish_with_error(&format!("{} of {} packages failed", failed, actionable));
        }

        let mut report = Report::new();
        for (entry, outcome) in entries.iter().zip(outcomes) {
            // Every entry is either satisfied, released or canceled
            let outcome = outcome.unwrap_or_else(|| Outcome::Failed {
                cause: "not scheduled".to_string(),
            });
            report.push(entry.name().clone(), outcome);
        }
        report
    }

    /// Fetch, build and record one package
    async fn install_entry(&self, entry: &PlanEntry) -> Result<Outcome> {
        let descriptor = &entry.descriptor;
        let name = &descriptor.name;
        self.progress
            .set_message(&format!("{} {}", progress_verb(entry.reason), name));

        let previous = self.store.load()?.get(name.as_str()).cloned();

        let fetched = self.source.fetch(descriptor).await?;

        // A failed rebuild must leave the package uninstalled, not recorded
        // with files that no longer exist
        if let Some(previous) = &previous {
            debug!("Removing previous build of {}", name);
            self.source.remove_artifacts(previous, true).await?;
            self.store.remove(name)?;
        }

        let artifacts = self.source.build(descriptor).await?;

        let identity = fetched.or_else(|| descriptor.identity.clone());
        let record = InstalledRecord::from_descriptor(descriptor, identity)
            .with_artifacts(artifacts.apps, artifacts.libs);
        self.store.commit(record)?;

        Ok(match entry.reason {
            InstallReason::NeedsInstall => Outcome::Installed,
            InstallReason::NeedsUpgrade => Outcome::Upgraded,
            InstallReason::NeedsForcedReinstall => Outcome::Reinstalled,
            InstallReason::AlreadySatisfied => Outcome::Satisfied,
        })
    }

    /// Uninstall packages
    ///
    /// Refuses with `RequiredBy`, before removing anything, if an installed
    /// package outside `names` depends on one of them. Names that are not
    /// installed are reported as already absent.
    pub async fn uninstall(&self, names: &[PackageName]) -> Result<Report> {
        let installed = self.store.load()?;

        let mut requested: Vec<&PackageName> = Vec::new();
        for name in names {
            if !requested.contains(&name) {
                requested.push(name);
            }
        }

        for name in &requested {
            let dependents: Vec<String> = installed
                .dependents_of(name.as_str())
                .into_iter()
                .filter(|dependent| !requested.contains(dependent))
                .map(|dependent| dependent.to_string())
                .collect();

            if !dependents.is_empty() {
                return Err(Error::RequiredBy {
                    package: name.to_string(),
                    dependents,
                });
            }
        }

        self.progress.set_length(requested.len() as u64);

        let mut report = Report::new();
        for name in requested {
            let outcome = match installed.get(name.as_str()) {
                None => {
                    warn!("Skipping {}: not installed", name);
                    Outcome::AlreadyAbsent
                }
                Some(record) => {
                    self.progress.set_message(&format!("Uninstalling {}", name));
                    match self.remove_record(record).await {
                        Ok(()) => Outcome::Removed,
                        Err(e) => Outcome::Failed { cause: e.to_string() },
                    }
                }
            };
            info!("{}: {}", name, outcome);
            self.progress.increment(1);
            report.push(name.clone(), outcome);
        }

        if report.is_success() {
            self.progress.finish_with_message("Uninstall complete");
        } else {
            self.progress.finish_with_error("Uninstall failed");
        }
        Ok(report)
    }

    async fn remove_record(&self, record: &InstalledRecord) -> Result<()> {
        self.source.remove_artifacts(record, false).await?;
        self.store.remove(&record.name)?;
        Ok(())
    }
}

fn progress_verb(reason: InstallReason) -> &'static str {
    match reason {
        InstallReason::NeedsInstall => "Installing",
        InstallReason::NeedsUpgrade => "Upgrading",
        InstallReason::NeedsForcedReinstall => "Reinstalling",
        InstallReason::AlreadySatisfied => "Checking",
    }
}
