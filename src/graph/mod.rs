//! Dependency graph over service keys.
//!
//! The graph is the authority on ordering: cycle detection at registration
//! time, topological startup/shutdown orders, per-target resolution order,
//! and the level groups that drive parallel lifecycle. Storage is a plain
//! adjacency map; the container wraps the graph in a lock and takes read
//! access for traversal, write access for mutation.
//!
//! Edges may reference keys that are not nodes (a registration can declare a
//! dependency before it is provided); traversals skip such dangling
//! references and [`DepGraph::validate`] reports them.

mod cycle;
mod topo;

pub use topo::ParallelGroup;

use std::collections::HashMap;

use crate::key::ServiceKey;

/// Directed acyclic graph of service keys, `key -> dependencies`.
#[derive(Debug, Default, Clone)]
pub struct DepGraph {
    nodes: HashMap<ServiceKey, Vec<ServiceKey>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a node with its dependency list. Idempotent
    /// upsert; dependencies may name keys that are not (yet) nodes.
    pub fn add_node(&mut self, key: ServiceKey, dependencies: Vec<ServiceKey>) {
        self.nodes.insert(key, dependencies);
    }

    /// Removes a node and its outgoing edges. Does not cascade: other nodes
    /// that depend on `key` keep their (now dangling) references.
    pub fn remove_node(&mut self, key: &ServiceKey) {
        self.nodes.remove(key);
    }

    pub fn has_node(&self, key: &ServiceKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Declared dependencies of a node, or `None` for unknown keys.
    pub fn dependencies(&self, key: &ServiceKey) -> Option<&[ServiceKey]> {
        self.nodes.get(key).map(Vec::as_slice)
    }

    /// Reverse index for one key: every node that declares `key` as a
    /// dependency. Computed on demand.
    pub fn dependents(&self, key: &ServiceKey) -> Vec<ServiceKey> {
        let mut dependents: Vec<ServiceKey> = self
            .nodes
            .iter()
            .filter(|(_, deps)| deps.contains(key))
            .map(|(k, _)| k.clone())
            .collect();
        dependents.sort();
        dependents
    }

    pub fn keys(&self) -> Vec<ServiceKey> {
        self.nodes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Keys referenced by any edge but absent as nodes.
    pub fn validate(&self) -> Vec<ServiceKey> {
        let mut missing = Vec::new();
        for deps in self.nodes.values() {
            for dep in deps {
                if !self.nodes.contains_key(dep) && !missing.contains(dep) {
                    missing.push(dep.clone());
                }
            }
        }
        missing.sort();
        missing
    }

    pub(crate) fn edges_of(&self, key: &ServiceKey) -> &[ServiceKey] {
        self.nodes.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn node_iter(&self) -> impl Iterator<Item = &ServiceKey> {
        self.nodes.keys()
    }
}
