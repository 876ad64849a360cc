//! Dependency graph among pending tasks.
//!
//! Design:
//! - Forward edges: task -> tasks it depends on (waits for)
//! - Reverse edges: task -> tasks that depend on it (waiting tasks)
//! - Invariant: edges and reverse_edges must be kept in sync
//!
//! Nodes do not have to be resident. A pending task may wait for an id that
//! was never added (e.g. a reference image rendered by another manager).

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::domain::TaskId;

pub struct DependencyGraph {
    /// Forward edges: task -> tasks it depends on
    edges: HashMap<TaskId, HashSet<TaskId>>,

    /// Reverse edges: task -> tasks that depend on it
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

/// DFS node color for cycle detection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
            reverse_edges: HashMap::new(),
        }
    }

    /// `task` depends on `depends_on`.
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        self.edges.entry(task).or_default().insert(depends_on);
        self.reverse_edges
            .entry(depends_on)
            .or_default()
            .insert(task);
    }

    pub fn remove_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        if let Entry::Occupied(mut e) = self.edges.entry(task) {
            e.get_mut().remove(&depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        if let Entry::Occupied(mut e) = self.reverse_edges.entry(depends_on) {
            e.get_mut().remove(&task);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Drop every outgoing edge of `task`.
    ///
    /// Incoming edges stay: other tasks still wait for this id.
    pub fn remove_task(&mut self, task: TaskId) {
        for depends_on in self.get_dependencies(task) {
            self.remove_dependency(task, depends_on);
        }
    }

    /// Tasks waiting for `completed_task`, regardless of their other dependencies.
    pub fn get_waiting_tasks(&self, completed_task: TaskId) -> Vec<TaskId> {
        self.reverse_edges
            .get(&completed_task)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_dependencies(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .get(&task)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Is `target` reachable from `from` by following dependency edges?
    ///
    /// `reaches(a, b)` means "a (transitively) waits for b".
    pub fn reaches(&self, from: TaskId, target: TaskId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(deps) = self.edges.get(&node) {
                stack.extend(deps.iter().copied().filter(|d| !visited.contains(d)));
            }
        }
        false
    }

    /// Find a cycle, if any.
    ///
    /// Returns the ids on the cycle in dependency order, first id repeated at the end.
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut colors: HashMap<TaskId, Color> = HashMap::new();
        let mut path = Vec::new();

        let mut roots: Vec<TaskId> = self.edges.keys().copied().collect();
        roots.sort();
        for root in roots {
            if colors.contains_key(&root) {
                continue;
            }
            if let Some(cycle) = self.dfs_cycle(root, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: TaskId,
        colors: &mut HashMap<TaskId, Color>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for dep in self.get_dependencies(node) {
            match colors.get(&dep) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|id| *id == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    if let Some(cycle) = self.dfs_cycle(dep, colors, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        colors.insert(node, Color::Black);
        path.pop();
        None
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> TaskId {
        TaskId::from_u128(n)
    }

    #[test]
    fn new_graph_is_empty() {
        let graph = DependencyGraph::new();
        assert!(graph.get_dependencies(id(1)).is_empty());
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn add_dependency_creates_both_edges() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id(1), id(2));

        graph.add_dependency(b, a); // B waits for A

        assert_eq!(graph.get_dependencies(b), vec![a]);
        assert!(graph.get_dependencies(a).is_empty());
        assert_eq!(graph.get_waiting_tasks(a), vec![b]);
    }

    #[test]
    fn remove_dependency_removes_both_edges() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id(1), id(2));

        graph.add_dependency(b, a);
        graph.remove_dependency(b, a);

        assert!(graph.get_dependencies(b).is_empty());
        assert!(graph.get_waiting_tasks(a).is_empty());
    }

    #[test]
    fn remove_task_keeps_incoming_edges() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id(1), id(2), id(3));

        graph.add_dependency(b, a);
        graph.add_dependency(c, b);
        graph.remove_task(b);

        assert!(graph.get_dependencies(b).is_empty());
        assert!(graph.get_waiting_tasks(a).is_empty());
        assert_eq!(graph.get_waiting_tasks(b), vec![c]);
    }

    #[test]
    fn reaches_follows_transitive_edges() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id(1), id(2), id(3));

        // C -> B -> A
        graph.add_dependency(c, b);
        graph.add_dependency(b, a);

        assert!(graph.reaches(c, a));
        assert!(!graph.reaches(a, c));
        assert!(graph.reaches(a, a));
    }

    #[test]
    fn detect_simple_cycle() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id(1), id(2));

        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn detect_longer_cycle() {
        let mut graph = DependencyGraph::new();
        let (a, b, c, d) = (id(1), id(2), id(3), id(4));

        // B -> C -> D -> B, plus B -> A
        graph.add_dependency(b, a);
        graph.add_dependency(c, b);
        graph.add_dependency(d, c);
        graph.add_dependency(b, d);

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle.len(), 4);
        assert!(!cycle.contains(&a));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        let (a, b, c, d) = (id(1), id(2), id(3), id(4));

        //     A
        //    / \
        //   B   C
        //    \ /
        //     D
        graph.add_dependency(b, a);
        graph.add_dependency(c, a);
        graph.add_dependency(d, b);
        graph.add_dependency(d, c);

        assert!(graph.detect_cycle().is_none());
    }
}
