// src/resolver/mod.rs

//! Dependency resolution
//!
//! Walks the declared dependencies of the requested packages depth-first
//! with three-state marking (unvisited, on the current path, finished):
//!
//! - reaching a package that is still on the current path is a cycle and
//!   aborts the whole resolution; a self-dependency is the one-node case
//! - reaching a finished package reuses its decision, so diamonds are
//!   visited once
//! - a package is decided only after all its dependencies, and appended to
//!   the plan at that point, which makes the plan dependency-first
//!
//! A package is (re)installed when it is missing, when `upgrade` is set and
//! its origin moved on, when `force` is set and it was requested
//! explicitly, or when any of its dependencies is being (re)installed.
//! After the requested packages are resolved, installed packages that
//! depend on something being changed are resolved too, so they get rebuilt.

mod graph;
mod plan;

pub use graph::DependencyGraph;
pub use plan::{InstallPlan, InstallReason, PlanEntry};

use crate::error::{Error, Result};
use crate::package::{PackageDescriptor, PackageName, PackageSpec};
use crate::source::PackageSource;
use crate::state::InstalledState;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Flags controlling resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Reinstall installed packages whose origin has a newer revision
    pub upgrade: bool,
    /// Reinstall the requested packages even if they are up to date
    pub force: bool,
}

impl ResolveOptions {
    pub fn upgrade() -> Self {
        Self {
            upgrade: true,
            force: false,
        }
    }

    pub fn force() -> Self {
        Self {
            upgrade: false,
            force: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    /// On the current traversal path
    InProgress,
    Done(InstallReason),
}

#[derive(Debug)]
struct Frame {
    descriptor: PackageDescriptor,
    /// Index of the next dependency to descend into
    next: usize,
}

enum Step {
    Descend { parent: PackageName, dependency: PackageName },
    Finish,
}

/// State of one resolution run
#[derive(Debug, Default)]
struct Traversal {
    marks: HashMap<PackageName, Mark>,
    stack: Vec<Frame>,
    entries: Vec<PlanEntry>,
    graph: DependencyGraph,
}

impl Traversal {
    fn is_changed(&self, name: &PackageName) -> bool {
        matches!(self.marks.get(name), Some(Mark::Done(reason)) if reason.is_actionable())
    }

    /// Cycle from the first occurrence of `repeated` on the stack back to it
    fn cycle_error(&self, repeated: &PackageName) -> Error {
        let start = self
            .stack
            .iter()
            .position(|frame| &frame.descriptor.name == repeated)
            .unwrap_or(0);

        let mut cycle: Vec<String> = self.stack[start..]
            .iter()
            .map(|frame| frame.descriptor.name.to_string())
            .collect();
        cycle.push(repeated.to_string());

        Error::CycleDetected { cycle }
    }
}

/// Dependency resolver
///
/// Resolution is a function of the requested specs, the options, the
/// installed-state snapshot and what the source reports; nothing is cached
/// between calls.
pub struct Resolver<'a> {
    source: &'a dyn PackageSource,
    installed: &'a InstalledState,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a dyn PackageSource, installed: &'a InstalledState) -> Self {
        Self {
            source,
            installed,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve the requested packages into an install plan
    ///
    /// Fails with `CycleDetected` or `PackageNotFound` without returning a
    /// partial plan.
    pub async fn resolve(&self, roots: &[PackageSpec]) -> Result<InstallPlan> {
        let roots = unique_roots(roots)?;
        let requested: HashMap<PackageName, PackageSpec> = roots
            .iter()
            .map(|spec| (spec.name.clone(), spec.clone()))
            .collect();

        let mut traversal = Traversal::default();

        for spec in &roots {
            self.visit(spec.clone(), &requested, &mut traversal).await?;
        }

        // Rebuild installed packages that depend on anything being changed
        loop {
            let mut pending: Vec<PackageName> = Vec::new();
            for entry in traversal.entries.iter().filter(|e| e.reason.is_actionable()) {
                for dependent in self.installed.dependents_of(entry.name().as_str()) {
                    if !traversal.marks.contains_key(dependent) && !pending.contains(dependent) {
                        pending.push(dependent.clone());
                    }
                }
            }

            if pending.is_empty() {
                break;
            }

            for name in pending {
                debug!("Checking installed dependent {}", name);
                let spec = self.installed.spec_for(&name)?;
                self.visit(spec, &requested, &mut traversal).await?;
            }
        }

        let plan = InstallPlan::new(
            traversal.entries,
            roots.into_iter().map(|spec| spec.name).collect(),
            traversal.graph,
        );

        info!(
            "Resolved {} packages ({} to install)",
            plan.len(),
            plan.actionable_count()
        );

        Ok(plan)
    }

    /// Depth-first traversal starting at `spec`
    async fn visit(
        &self,
        spec: PackageSpec,
        requested: &HashMap<PackageName, PackageSpec>,
        traversal: &mut Traversal,
    ) -> Result<()> {
        if traversal.marks.contains_key(&spec.name) {
            return Ok(());
        }

        self.enter(&spec, traversal).await?;

        loop {
            let step = match traversal.stack.last_mut() {
                None => break,
                Some(frame) => match frame.descriptor.dependencies.get(frame.next) {
                    Some(dependency) => {
                        let dependency = dependency.clone();
                        frame.next += 1;
                        Step::Descend {
                            parent: frame.descriptor.name.clone(),
                            dependency,
                        }
                    }
                    None => Step::Finish,
                },
            };

            match step {
                Step::Descend { parent, dependency } => {
                    traversal.graph.add_node(dependency.clone());
                    traversal.graph.add_edge(&parent, &dependency);

                    match traversal.marks.get(&dependency) {
                        Some(Mark::InProgress) => return Err(traversal.cycle_error(&dependency)),
                        Some(Mark::Done(_)) => {}
                        None => {
                            let spec = match requested.get(&dependency) {
                                Some(spec) => spec.clone(),
                                None => self.installed.spec_for(&dependency)?,
                            };
                            self.enter(&spec, traversal).await?;
                        }
                    }
                }
                Step::Finish => {
                    let Some(frame) = traversal.stack.pop() else {
                        break;
                    };
                    let reason = self.decide(&frame.descriptor, requested, traversal);
                    debug!("{}: {}", frame.descriptor.name, reason);

                    traversal
                        .marks
                        .insert(frame.descriptor.name.clone(), Mark::Done(reason));
                    traversal.entries.push(PlanEntry::new(frame.descriptor, reason));
                }
            }
        }

        Ok(())
    }

    /// Describe a package and push it onto the traversal path
    async fn enter(&self, spec: &PackageSpec, traversal: &mut Traversal) -> Result<()> {
        debug!("Resolving {}", spec);
        traversal.marks.insert(spec.name.clone(), Mark::InProgress);

        let descriptor = self.source.describe(spec).await?;
        if descriptor.name != spec.name {
            return Err(Error::InvalidOrigin(format!(
                "{} describes package '{}' instead of '{}'",
                spec.origin, descriptor.name, spec.name
            )));
        }

        traversal.graph.add_node(descriptor.name.clone());
        traversal.stack.push(Frame { descriptor, next: 0 });
        Ok(())
    }

    fn decide(
        &self,
        descriptor: &PackageDescriptor,
        requested: &HashMap<PackageName, PackageSpec>,
        traversal: &Traversal,
    ) -> InstallReason {
        let Some(record) = self.installed.get(descriptor.name.as_str()) else {
            return InstallReason::NeedsInstall;
        };

        if self.options.upgrade && !descriptor.is_up_to_date(record.identity.as_ref()) {
            return InstallReason::NeedsUpgrade;
        }

        if self.options.force && requested.contains_key(&descriptor.name) {
            return InstallReason::NeedsForcedReinstall;
        }

        if descriptor.dependencies.iter().any(|dep| traversal.is_changed(dep)) {
            return InstallReason::NeedsForcedReinstall;
        }

        InstallReason::AlreadySatisfied
    }
}

/// Drop repeated specs, rejecting the same name with different origins
fn unique_roots(roots: &[PackageSpec]) -> Result<Vec<PackageSpec>> {
    let mut seen: HashSet<&PackageName> = HashSet::new();
    let mut unique = Vec::new();
    let mut conflicting = Vec::new();

    for spec in roots {
        if seen.insert(&spec.name) {
            unique.push(spec.clone());
        } else if unique
            .iter()
            .any(|u: &PackageSpec| u.name == spec.name && u.origin != spec.origin)
            && !conflicting.contains(&spec.name.to_string())
        {
            conflicting.push(spec.name.to_string());
        }
    }

    if conflicting.is_empty() {
        Ok(unique)
    } else {
        Err(Error::DuplicatePackage(conflicting.join(", ")))
    }
}

/// Resolve `roots` against `installed` using `source`
pub async fn resolve(
    roots: &[PackageSpec],
    options: ResolveOptions,
    installed: &InstalledState,
    source: &dyn PackageSource,
) -> Result<InstallPlan> {
    Resolver::new(source, installed)
        .with_options(options)
        .resolve(roots)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ContentIdentity, Origin};
    use crate::source::BuildArtifacts;
    use crate::state::InstalledRecord;
    use async_trait::async_trait;

    /// Source backed by a fixed table of descriptors
    struct TableSource {
        packages: HashMap<String, PackageDescriptor>,
    }

    impl TableSource {
        fn new(table: &[(&str, &[&str], &str)]) -> Self {
            let packages = table
                .iter()
                .map(|(name, deps, sha)| {
                    let descriptor = PackageDescriptor::new(PackageName::new(name).unwrap(), Origin::Index)
                        .with_dependencies(deps.iter().map(|d| PackageName::new(d).unwrap()))
                        .with_identity(Some(ContentIdentity::new(*sha)));
                    (name.to_string(), descriptor)
                })
                .collect();
            Self { packages }
        }
    }

    #[async_trait]
    impl PackageSource for TableSource {
        async fn describe(&self, spec: &PackageSpec) -> Result<PackageDescriptor> {
            self.packages
                .get(spec.name.as_str())
                .cloned()
                .ok_or_else(|| Error::PackageNotFound {
                    name: spec.name.to_string(),
                })
        }

        async fn fetch(&self, descriptor: &PackageDescriptor) -> Result<Option<ContentIdentity>> {
            Ok(descriptor.identity.clone())
        }

        async fn build(&self, _descriptor: &PackageDescriptor) -> Result<BuildArtifacts> {
            Ok(BuildArtifacts::default())
        }

        async fn remove_artifacts(&self, _record: &InstalledRecord, _keep_sources: bool) -> Result<()> {
            Ok(())
        }
    }

    fn spec(name: &str) -> PackageSpec {
        PackageSpec::index(PackageName::new(name).unwrap())
    }

    fn names(plan: &InstallPlan) -> Vec<&str> {
        plan.entries().iter().map(|e| e.name().as_str()).collect()
    }

    #[tokio::test]
    async fn test_chain_is_dependency_first() {
        let source = TableSource::new(&[("a", &["b"], "1"), ("b", &["c"], "1"), ("c", &[], "1")]);
        let installed = InstalledState::new();

        let plan = resolve(&[spec("a")], ResolveOptions::default(), &installed, &source)
            .await
            .unwrap();
        assert_eq!(names(&plan), vec!["c", "b", "a"]);
        assert!(plan.entries().iter().all(|e| e.reason == InstallReason::NeedsInstall));
    }

    #[tokio::test]
    async fn test_self_cycle() {
        let source = TableSource::new(&[("a", &["a"], "1")]);
        let installed = InstalledState::new();

        let err = resolve(&[spec("a")], ResolveOptions::default(), &installed, &source)
            .await
            .unwrap_err();
        match err {
            Error::CycleDetected { cycle } => assert_eq!(cycle, vec!["a", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cycle_path_starts_at_repeated_node() {
        let source = TableSource::new(&[
            ("root", &["a"], "1"),
            ("a", &["b"], "1"),
            ("b", &["c"], "1"),
            ("c", &["a"], "1"),
        ]);
        let installed = InstalledState::new();

        let err = resolve(&[spec("root")], ResolveOptions::default(), &installed, &source)
            .await
            .unwrap_err();
        match err {
            Error::CycleDetected { cycle } => assert_eq!(cycle, vec!["a", "b", "c", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_roots() {
        let source = TableSource::new(&[("a", &[], "1")]);
        let installed = InstalledState::new();

        let plan = resolve(&[spec("a"), spec("a")], ResolveOptions::default(), &installed, &source)
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);

        let local = PackageSpec::new(
            PackageName::new("a").unwrap(),
            Origin::Local(std::path::PathBuf::from("/tmp/a")),
        );
        let err = resolve(&[spec("a"), local], ResolveOptions::default(), &installed, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePackage(_)));
    }

    #[tokio::test]
    async fn test_installed_dependent_is_rebuilt() {
        let source = TableSource::new(&[("lib", &[], "new"), ("app", &["lib"], "1")]);
        let installed = InstalledState::from_records([
            InstalledRecord::new(PackageName::new("lib").unwrap()).with_identity("old"),
            InstalledRecord::new(PackageName::new("app").unwrap())
                .with_identity("1")
                .with_dependencies([PackageName::new("lib").unwrap()]),
        ]);

        let plan = resolve(&[spec("lib")], ResolveOptions::upgrade(), &installed, &source)
            .await
            .unwrap();
        assert_eq!(names(&plan), vec!["lib", "app"]);
        assert_eq!(plan.reason("lib"), Some(InstallReason::NeedsUpgrade));
        assert_eq!(plan.reason("app"), Some(InstallReason::NeedsForcedReinstall));
        assert_eq!(plan.roots(), &[PackageName::new("lib").unwrap()]);
    }
}
