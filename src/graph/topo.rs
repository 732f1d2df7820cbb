//! Topological orders and parallel level groups.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;

use super::DepGraph;

/// One level of the parallel lifecycle schedule: every key whose
/// dependencies all live at earlier levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelGroup {
    pub level: usize,
    pub keys: Vec<ServiceKey>,
}

impl DepGraph {
    /// Kahn's algorithm over in-degrees. Dependencies sort before their
    /// dependents; ties break by map iteration order (unspecified but stable
    /// within a run). Fails with `CircularDependency` when a cycle keeps the
    /// sort from consuming every node.
    pub fn topological_sort(&self) -> DiResult<Vec<ServiceKey>> {
        let mut dependents: HashMap<ServiceKey, Vec<ServiceKey>> = HashMap::new();
        let mut in_degree: HashMap<ServiceKey, usize> = HashMap::new();

        for key in self.node_iter() {
            in_degree.insert(key.clone(), 0);
        }
        for key in self.node_iter() {
            for dep in self.edges_of(key) {
                if !self.has_node(dep) {
                    continue;
                }
                dependents.entry(dep.clone()).or_default().push(key.clone());
                *in_degree.get_mut(key).expect("node present") += 1;
            }
        }

        let mut queue: VecDeque<ServiceKey> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(key, _)| key.clone())
            .collect();

        let mut sorted = Vec::with_capacity(self.len());
        while let Some(key) = queue.pop_front() {
            if let Some(deps) = dependents.get(&key) {
                for dependent in deps {
                    let degree = in_degree.get_mut(dependent).expect("node present");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.clone());
                    }
                }
            }
            sorted.push(key);
        }

        if sorted.len() != self.len() {
            return Err(self.cycle_error());
        }
        Ok(sorted)
    }

    /// Reverse of [`topological_sort`](DepGraph::topological_sort).
    pub fn reverse_topological_sort(&self) -> DiResult<Vec<ServiceKey>> {
        let mut sorted = self.topological_sort()?;
        sorted.reverse();
        Ok(sorted)
    }

    /// Order in which services start: dependencies first.
    pub fn startup_order(&self) -> DiResult<Vec<ServiceKey>> {
        self.topological_sort()
    }

    /// Order in which services stop: dependents first.
    pub fn shutdown_order(&self) -> DiResult<Vec<ServiceKey>> {
        self.reverse_topological_sort()
    }

    /// Post-order DFS from `target`: each node appears after all of its
    /// dependencies, ending with `target` itself. An unknown target yields
    /// just `[target]`; a cycle along the DFS path fails.
    pub fn resolution_order(&self, target: &ServiceKey) -> DiResult<Vec<ServiceKey>> {
        if !self.has_node(target) {
            return Ok(vec![target.clone()]);
        }

        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        let mut order = Vec::new();
        self.resolution_visit(target, &mut visited, &mut visiting, &mut order)?;
        Ok(order)
    }

    fn resolution_visit(
        &self,
        key: &ServiceKey,
        visited: &mut HashSet<ServiceKey>,
        visiting: &mut HashSet<ServiceKey>,
        order: &mut Vec<ServiceKey>,
    ) -> DiResult<()> {
        if visiting.contains(key) {
            return Err(self.cycle_error());
        }
        if visited.contains(key) {
            return Ok(());
        }

        visiting.insert(key.clone());
        for dep in self.edges_of(key) {
            if !self.has_node(dep) {
                continue;
            }
            self.resolution_visit(dep, visited, visiting, order)?;
        }
        visiting.remove(key);
        visited.insert(key.clone());
        order.push(key.clone());
        Ok(())
    }

    /// Level groups for parallel startup: `level(k) = 1 + max(level(dep))`
    /// over deps that exist as nodes, `0` for leaves. Groups are ordered by
    /// ascending level; everything in one group may start concurrently once
    /// the previous group has joined.
    pub fn parallel_startup_groups(&self) -> DiResult<Vec<ParallelGroup>> {
        let mut levels: HashMap<ServiceKey, usize> = HashMap::new();
        let mut visiting = HashSet::new();
        for key in self.node_iter() {
            self.level_of(key, &mut levels, &mut visiting)?;
        }

        let mut by_level: HashMap<usize, Vec<ServiceKey>> = HashMap::new();
        let mut max_level = 0;
        for (key, level) in levels {
            max_level = max_level.max(level);
            by_level.entry(level).or_default().push(key);
        }

        let mut groups = Vec::with_capacity(max_level + 1);
        for level in 0..=max_level {
            if let Some(keys) = by_level.remove(&level) {
                groups.push(ParallelGroup { level, keys });
            }
        }
        Ok(groups)
    }

    /// [`parallel_startup_groups`](DepGraph::parallel_startup_groups)
    /// reversed, with levels renumbered in shutdown order.
    pub fn parallel_shutdown_groups(&self) -> DiResult<Vec<ParallelGroup>> {
        let mut groups = self.parallel_startup_groups()?;
        groups.reverse();
        for (level, group) in groups.iter_mut().enumerate() {
            group.level = level;
        }
        Ok(groups)
    }

    fn level_of(
        &self,
        key: &ServiceKey,
        levels: &mut HashMap<ServiceKey, usize>,
        visiting: &mut HashSet<ServiceKey>,
    ) -> DiResult<usize> {
        if let Some(level) = levels.get(key) {
            return Ok(*level);
        }
        if !visiting.insert(key.clone()) {
            return Err(self.cycle_error());
        }

        let mut level = 0;
        for dep in self.edges_of(key) {
            if !self.has_node(dep) || dep == key {
                continue;
            }
            level = level.max(self.level_of(dep, levels, visiting)? + 1);
        }

        visiting.remove(key);
        levels.insert(key.clone(), level);
        Ok(level)
    }

    fn cycle_error(&self) -> DiError {
        let path = self
            .detect_cycles()
            .first()
            .and_then(|scc| scc.first().and_then(|k| self.find_cycle_path(k)))
            .unwrap_or_default();
        DiError::CircularDependency(path)
    }
}
