// src/resolver/plan.rs

//! Install plan produced by the resolver
//!
//! Entries are in dependency-first order: an entry never precedes one of
//! its dependencies, and each package appears at most once.

use super::graph::DependencyGraph;
use crate::package::{PackageDescriptor, PackageName};
use std::fmt;

/// Why a package is in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallReason {
    /// Not installed yet
    NeedsInstall,
    /// Installed, but the origin has a different revision and upgrade was requested
    NeedsUpgrade,
    /// Installed and current, but forced or invalidated by a changed dependency
    NeedsForcedReinstall,
    /// Installed and current; nothing to do
    AlreadySatisfied,
}

impl InstallReason {
    /// Whether the orchestrator has to fetch and build the package
    pub fn is_actionable(self) -> bool {
        !matches!(self, InstallReason::AlreadySatisfied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallReason::NeedsInstall => "install",
            InstallReason::NeedsUpgrade => "upgrade",
            InstallReason::NeedsForcedReinstall => "reinstall",
            InstallReason::AlreadySatisfied => "up to date",
        }
    }
}

impl fmt::Display for InstallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One package in the plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub descriptor: PackageDescriptor,
    pub reason: InstallReason,
}

impl PlanEntry {
    pub fn new(descriptor: PackageDescriptor, reason: InstallReason) -> Self {
        Self { descriptor, reason }
    }

    pub fn name(&self) -> &PackageName {
        &self.descriptor.name
    }
}

/// Ordered, deduplicated result of dependency resolution
#[derive(Debug, Clone)]
pub struct InstallPlan {
    entries: Vec<PlanEntry>,
    roots: Vec<PackageName>,
    graph: DependencyGraph,
}

impl InstallPlan {
    pub(crate) fn new(entries: Vec<PlanEntry>, roots: Vec<PackageName>, graph: DependencyGraph) -> Self {
        Self { entries, roots, graph }
    }

    /// Build a plan from entries that are already in dependency-first order
    ///
    /// Dependencies that name packages outside the plan are ignored when
    /// building the graph.
    pub fn from_entries(entries: Vec<PlanEntry>, roots: Vec<PackageName>) -> Self {
        let mut graph = DependencyGraph::new();
        for entry in &entries {
            graph.add_node(entry.name().clone());
        }
        for entry in &entries {
            for dep in &entry.descriptor.dependencies {
                if graph.contains(dep.as_str()) {
                    graph.add_edge(entry.name(), dep);
                }
            }
        }
        Self::new(entries, roots, graph)
    }

    /// All entries, including already-satisfied ones
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Entries that need fetching and building
    pub fn actionable(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.reason.is_actionable())
    }

    pub fn actionable_count(&self) -> usize {
        self.actionable().count()
    }

    pub fn get(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.name().as_str() == name)
    }

    pub fn reason(&self, name: &str) -> Option<InstallReason> {
        self.get(name).map(|e| e.reason)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name().as_str() == name)
    }

    /// Packages explicitly requested by the caller
    pub fn roots(&self) -> &[PackageName] {
        &self.roots
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// True when nothing needs to be done
    pub fn is_satisfied(&self) -> bool {
        self.actionable().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Origin;

    fn entry(name: &str, deps: &[&str], reason: InstallReason) -> PlanEntry {
        let descriptor = PackageDescriptor::new(PackageName::new(name).unwrap(), Origin::Index)
            .with_dependencies(deps.iter().map(|d| PackageName::new(d).unwrap()));
        PlanEntry::new(descriptor, reason)
    }

    #[test]
    fn test_actionable_filter() {
        let plan = InstallPlan::from_entries(
            vec![
                entry("core", &[], InstallReason::AlreadySatisfied),
                entry("solver", &["core"], InstallReason::NeedsInstall),
            ],
            vec![PackageName::new("solver").unwrap()],
        );

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.actionable_count(), 1);
        assert!(!plan.is_satisfied());
        assert_eq!(plan.reason("core"), Some(InstallReason::AlreadySatisfied));
        assert_eq!(plan.position("solver"), Some(1));
        assert_eq!(plan.graph().dependencies("solver"), &[PackageName::new("core").unwrap()]);
    }

    #[test]
    fn test_from_entries_ignores_outside_dependencies() {
        let plan = InstallPlan::from_entries(
            vec![entry("solver", &["missing"], InstallReason::NeedsInstall)],
            Vec::new(),
        );
        assert!(plan.graph().dependencies("solver").is_empty());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(InstallReason::NeedsUpgrade.to_string(), "upgrade");
        assert!(!InstallReason::AlreadySatisfied.is_actionable());
        assert!(InstallReason::NeedsForcedReinstall.is_actionable());
    }
}
