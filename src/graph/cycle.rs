//! Cycle detection: Tarjan's strongly connected components plus a DFS path
//! finder for error reporting.

use std::collections::HashMap;

use crate::key::ServiceKey;

use super::DepGraph;

struct Tarjan<'g> {
    graph: &'g DepGraph,
    index: usize,
    stack: Vec<ServiceKey>,
    on_stack: HashMap<ServiceKey, bool>,
    indices: HashMap<ServiceKey, usize>,
    lowlink: HashMap<ServiceKey, usize>,
    sccs: Vec<Vec<ServiceKey>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g DepGraph) -> Self {
        Self {
            graph,
            index: 0,
            stack: Vec::new(),
            on_stack: HashMap::new(),
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            sccs: Vec::new(),
        }
    }

    fn strong_connect(&mut self, key: &ServiceKey) {
        self.indices.insert(key.clone(), self.index);
        self.lowlink.insert(key.clone(), self.index);
        self.index += 1;
        self.stack.push(key.clone());
        self.on_stack.insert(key.clone(), true);

        let graph = self.graph;
        for dep in graph.edges_of(key) {
            if !graph.has_node(dep) {
                continue;
            }
            if !self.indices.contains_key(dep) {
                let dep = dep.clone();
                self.strong_connect(&dep);
                let dep_low = self.lowlink[&dep];
                let low = self.lowlink.get_mut(key).expect("visited");
                *low = (*low).min(dep_low);
            } else if self.on_stack.get(dep).copied().unwrap_or(false) {
                let dep_index = self.indices[dep];
                let low = self.lowlink.get_mut(key).expect("visited");
                *low = (*low).min(dep_index);
            }
        }

        if self.lowlink[key] == self.indices[key] {
            let mut scc = Vec::new();
            loop {
                let member = self.stack.pop().expect("stack member");
                self.on_stack.insert(member.clone(), false);
                let done = member == *key;
                scc.push(member);
                if done {
                    break;
                }
            }
            self.sccs.push(scc);
        }
    }
}

impl DepGraph {
    /// Runs Tarjan's SCC and returns the cyclic components: every component
    /// with two or more members, plus single nodes with a self-loop.
    pub fn detect_cycles(&self) -> Vec<Vec<ServiceKey>> {
        let mut tarjan = Tarjan::new(self);
        let keys: Vec<ServiceKey> = self.node_iter().cloned().collect();
        for key in &keys {
            if !tarjan.indices.contains_key(key) {
                tarjan.strong_connect(key);
            }
        }

        tarjan
            .sccs
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || (scc.len() == 1 && self.edges_of(&scc[0]).contains(&scc[0]))
            })
            .collect()
    }

    /// True iff the graph contains a cycle (SCC of size > 1 or a self-loop).
    pub fn has_cycle(&self) -> bool {
        !self.detect_cycles().is_empty()
    }

    /// DFS from `start` returning the first cycle found as a path whose
    /// first and last elements coincide, or `None` when `start` reaches no
    /// cycle. Used to decorate `CircularDependency` errors.
    pub fn find_cycle_path(&self, start: &ServiceKey) -> Option<Vec<ServiceKey>> {
        let mut visited: HashMap<ServiceKey, bool> = HashMap::new();
        let mut path: Vec<ServiceKey> = Vec::new();
        self.cycle_dfs(start, &mut visited, &mut path)
    }

    fn cycle_dfs(
        &self,
        key: &ServiceKey,
        visited: &mut HashMap<ServiceKey, bool>,
        path: &mut Vec<ServiceKey>,
    ) -> Option<Vec<ServiceKey>> {
        if path.contains(key) {
            let from = path.iter().position(|k| k == key).expect("on path");
            let mut cycle: Vec<ServiceKey> = path[from..].to_vec();
            cycle.push(key.clone());
            return Some(cycle);
        }
        if visited.get(key).copied().unwrap_or(false) {
            return None;
        }

        visited.insert(key.clone(), true);
        path.push(key.clone());

        for dep in self.edges_of(key) {
            if !self.has_node(dep) {
                continue;
            }
            if let Some(cycle) = self.cycle_dfs(dep, visited, path) {
                return Some(cycle);
            }
        }

        path.pop();
        None
    }

    /// One representative path per cyclic component.
    pub fn all_cycle_paths(&self) -> Vec<Vec<ServiceKey>> {
        self.detect_cycles()
            .iter()
            .filter_map(|scc| scc.first().and_then(|k| self.find_cycle_path(k)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ServiceKey {
        ServiceKey::from(name)
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let mut graph = DepGraph::new();
        graph.add_node(key("a"), vec![]);
        graph.add_node(key("b"), vec![key("a")]);
        graph.add_node(key("c"), vec![key("a"), key("b")]);

        assert!(!graph.has_cycle());
        assert!(graph.detect_cycles().is_empty());
        assert!(graph.find_cycle_path(&key("c")).is_none());
    }

    #[test]
    fn two_node_cycle_detected() {
        let mut graph = DepGraph::new();
        graph.add_node(key("a"), vec![key("b")]);
        graph.add_node(key("b"), vec![key("a")]);

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);

        let path = graph.find_cycle_path(&key("a")).expect("cycle path");
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = DepGraph::new();
        graph.add_node(key("a"), vec![key("a")]);

        let cycles = graph.detect_cycles();
        assert_eq!(cycles, vec![vec![key("a")]]);
        assert!(graph.has_cycle());
    }

    #[test]
    fn dangling_edges_do_not_form_cycles() {
        let mut graph = DepGraph::new();
        graph.add_node(key("a"), vec![key("ghost")]);

        assert!(!graph.has_cycle());
    }

    #[test]
    fn multiple_components_each_reported() {
        let mut graph = DepGraph::new();
        graph.add_node(key("a"), vec![key("b")]);
        graph.add_node(key("b"), vec![key("a")]);
        graph.add_node(key("c"), vec![key("d")]);
        graph.add_node(key("d"), vec![key("c")]);
        graph.add_node(key("e"), vec![]);

        assert_eq!(graph.detect_cycles().len(), 2);
        assert_eq!(graph.all_cycle_paths().len(), 2);
    }
}
