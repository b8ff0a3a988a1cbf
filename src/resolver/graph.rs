// src/resolver/graph.rs

//! Dependency graph for a single resolution run
//!
//! Edges point from a dependent to its dependency. Reverse edges are kept
//! alongside so dependents can be found without scanning every node.

use crate::package::PackageName;
use std::collections::{HashMap, HashSet, VecDeque};

/// Dependency graph built while resolving
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes in the order they were first reached
    nodes: Vec<PackageName>,
    /// Map from package name to its dependencies
    edges: HashMap<PackageName, Vec<PackageName>>,
    /// Map from package name to packages that depend on it
    reverse_edges: HashMap<PackageName, Vec<PackageName>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; adding an existing node is a no-op
    pub fn add_node(&mut self, name: PackageName) {
        if !self.edges.contains_key(&name) {
            self.edges.insert(name.clone(), Vec::new());
            self.nodes.push(name);
        }
    }

    /// Add a "depends on" edge; duplicate edges are ignored
    pub fn add_edge(&mut self, from: &PackageName, to: &PackageName) {
        let forward = self.edges.entry(from.clone()).or_default();
        if forward.contains(to) {
            return;
        }
        forward.push(to.clone());

        self.reverse_edges
            .entry(to.clone())
            .or_default()
            .push(from.clone());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn nodes(&self) -> &[PackageName] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a package
    pub fn dependencies(&self, name: &str) -> &[PackageName] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Packages that directly depend on this package
    pub fn dependents(&self, name: &str) -> &[PackageName] {
        self.reverse_edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every package that depends on this one, directly or transitively
    ///
    /// Breadth-first over reverse edges, nearest dependents first.
    pub fn transitive_dependents(&self, name: &str) -> Vec<PackageName> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(name);

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current) {
                if dependent.as_str() != name && seen.insert(dependent.clone()) {
                    result.push(dependent.clone());
                    queue.push_back(dependent.as_str());
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for n in ["a", "b", "c", "d"] {
            graph.add_node(name(n));
        }
        graph.add_edge(&name("a"), &name("b"));
        graph.add_edge(&name("a"), &name("c"));
        graph.add_edge(&name("b"), &name("d"));
        graph.add_edge(&name("c"), &name("d"));
        graph
    }

    #[test]
    fn test_edges_and_reverse_edges() {
        let graph = diamond();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependencies("a"), &[name("b"), name("c")]);
        assert_eq!(graph.dependents("d"), &[name("b"), name("c")]);
        assert!(graph.dependencies("d").is_empty());
        assert!(graph.dependents("unknown").is_empty());
    }

    #[test]
    fn test_duplicate_edge_ignored() {
        let mut graph = diamond();
        graph.add_edge(&name("a"), &name("b"));
        assert_eq!(graph.dependencies("a").len(), 2);
        assert_eq!(graph.dependents("b"), &[name("a")]);
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = diamond();
        let mut dependents = graph.transitive_dependents("d");
        dependents.sort();
        assert_eq!(dependents, vec![name("a"), name("b"), name("c")]);
        assert!(graph.transitive_dependents("a").is_empty());
    }
}
