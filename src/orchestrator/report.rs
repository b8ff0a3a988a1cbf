// src/orchestrator/report.rs

//! Per-package results of an install or uninstall run

use crate::package::PackageName;
use std::fmt;

/// What happened to one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Newly installed
    Installed,
    /// Rebuilt from a newer revision
    Upgraded,
    /// Rebuilt from the same revision (forced, or a dependency changed)
    Reinstalled,
    /// Already installed and up to date; nothing was done
    Satisfied,
    /// Fetch, build or record commit failed
    Failed { cause: String },
    /// Not attempted because a dependency failed
    DependencyFailed { dependency: PackageName },
    /// Uninstalled
    Removed,
    /// Uninstall requested for a package that is not installed
    AlreadyAbsent,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    /// Whether the package was not (re)installed because of a failure
    pub fn is_skipped_by_failure(&self) -> bool {
        matches!(self, Outcome::DependencyFailed { .. })
    }

    /// Whether the run changed this package on disk
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Outcome::Installed | Outcome::Upgraded | Outcome::Reinstalled | Outcome::Removed
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Installed => write!(f, "installed"),
            Outcome::Upgraded => write!(f, "upgraded"),
            Outcome::Reinstalled => write!(f, "reinstalled"),
            Outcome::Satisfied => write!(f, "already up to date"),
            Outcome::Failed { cause } => write!(f, "failed: {}", cause),
            Outcome::DependencyFailed { dependency } => {
                write!(f, "skipped (dependency '{}' failed)", dependency)
            }
            Outcome::Removed => write!(f, "uninstalled"),
            Outcome::AlreadyAbsent => write!(f, "not installed"),
        }
    }
}

/// Ordered outcomes of a run
///
/// Install reports follow plan order, so dependencies come first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    outcomes: Vec<(PackageName, Outcome)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: PackageName, outcome: Outcome) {
        self.outcomes.push((name, outcome));
    }

    pub fn outcomes(&self) -> &[(PackageName, Outcome)] {
        &self.outcomes
    }

    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, outcome)| outcome)
    }

    /// Packages that failed themselves
    pub fn failures(&self) -> impl Iterator<Item = (&PackageName, &Outcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(name, outcome)| (name, outcome))
    }

    /// True iff no package failed
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Number of packages the run changed on disk
    pub fn changed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_change()).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
