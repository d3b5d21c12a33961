//! Adjacency storage, depth maintenance, cycle rejection.

use crate::{NodeId, Traversal};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Dependency graph over node ids.
///
/// Parents and children are kept as adjacency sets in both directions, so
/// upward and downward closures are symmetric BFS walks. `depth` is the
/// longest-parent-chain lattice value and is recomputed incrementally along
/// paths where an edge change can actually alter it.
#[derive(Debug, Default, Clone)]
pub struct DepGraph {
    parents: HashMap<NodeId, HashSet<NodeId>>,
    children: HashMap<NodeId, HashSet<NodeId>>,
    depth: HashMap<NodeId, u32>,
    roots: HashSet<NodeId>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.depth.contains_key(&id)
    }

    /// Register `id` as a member (initially a root). Idempotent.
    pub fn add_node(&mut self, id: NodeId) {
        if self.depth.contains_key(&id) {
            return;
        }
        self.depth.insert(id, 0);
        self.roots.insert(id);
        self.parents.insert(id, HashSet::new());
        self.children.insert(id, HashSet::new());
    }

    /// Detach `id` from both sides and drop it. Children left parentless are
    /// promoted to roots; depth re-cascades from each detached child.
    pub fn remove_node(&mut self, id: NodeId) {
        if self.depth.remove(&id).is_none() {
            return;
        }
        self.roots.remove(&id);
        for parent in self.parents.remove(&id).unwrap_or_default() {
            if let Some(set) = self.children.get_mut(&parent) {
                set.remove(&id);
            }
        }
        let orphans = self.children.remove(&id).unwrap_or_default();
        for child in orphans {
            if let Some(set) = self.parents.get_mut(&child) {
                set.remove(&id);
                if set.is_empty() {
                    self.roots.insert(child);
                }
            }
            self.recompute_depth_from(child);
        }
    }

    /// Parents of `id` (empty when unknown).
    pub fn parents_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.get(&id).into_iter().flatten().copied()
    }

    /// Children of `id` (empty when unknown).
    pub fn children_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children.get(&id).into_iter().flatten().copied()
    }

    /// Depth of `id`: 0 for roots, else `1 + max(depth of parents)`.
    pub fn depth(&self, id: NodeId) -> u32 {
        self.depth.get(&id).copied().unwrap_or(0)
    }

    /// The current set of parentless member nodes.
    pub fn roots(&self) -> &HashSet<NodeId> {
        &self.roots
    }

    /// Insert the edge `parent → child`. Self-loops, unknown endpoints, and
    /// edges that would close a cycle are rejected with a `false` return.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child {
            warn!(%parent, "rejecting self-loop edge");
            return false;
        }
        if !self.has_node(parent) || !self.has_node(child) {
            warn!(%parent, %child, "rejecting edge with unknown endpoint");
            return false;
        }
        if self.reaches(child, parent) {
            warn!(%parent, %child, "rejecting edge that would create a cycle");
            return false;
        }
        let inserted = self.children.entry(parent).or_default().insert(child);
        self.parents.entry(child).or_default().insert(parent);
        if inserted {
            self.roots.remove(&child);
            self.recompute_depth_from(child);
        }
        true
    }

    /// Remove the edge `parent → child`. A child left parentless re-enters
    /// the root set.
    pub fn remove_edge(&mut self, parent: NodeId, child: NodeId) -> bool {
        let removed = self
            .children
            .get_mut(&parent)
            .is_some_and(|set| set.remove(&child));
        if !removed {
            return false;
        }
        if let Some(set) = self.parents.get_mut(&child) {
            set.remove(&parent);
            if set.is_empty() {
                self.roots.insert(child);
            }
        }
        self.recompute_depth_from(child);
        true
    }

    /// Expand `base` according to a traversal policy. `DirtyOnly` restricts
    /// the base set to current members; the closures walk children or
    /// parents breadth-first.
    pub fn expand_by_traversal(
        &self,
        base: impl IntoIterator<Item = NodeId>,
        policy: Traversal,
    ) -> HashSet<NodeId> {
        match policy {
            Traversal::All => self.depth.keys().copied().collect(),
            Traversal::DirtyOnly => {
                base.into_iter().filter(|id| self.has_node(*id)).collect()
            }
            Traversal::DirtyAndDown => self.closure(base, true),
            Traversal::DirtyAndUp => self.closure(base, false),
        }
    }

    fn closure(&self, base: impl IntoIterator<Item = NodeId>, down: bool) -> HashSet<NodeId> {
        let mut seen: HashSet<NodeId> =
            base.into_iter().filter(|id| self.has_node(*id)).collect();
        let mut queue: VecDeque<NodeId> = seen.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let adjacent = if down { self.children.get(&id) } else { self.parents.get(&id) };
            for adj in adjacent.into_iter().flatten() {
                if seen.insert(*adj) {
                    queue.push_back(*adj);
                }
            }
        }
        seen
    }

    /// `true` when `to` is reachable from `from` through child edges.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.children.get(&id).into_iter().flatten());
        }
        false
    }

    /// Recompute `depth(start)` from its parents and cascade to descendants
    /// only along paths where the value actually changes.
    fn recompute_depth_from(&mut self, start: NodeId) {
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let computed = self
                .parents
                .get(&id)
                .into_iter()
                .flatten()
                .map(|p| self.depth(*p) + 1)
                .max()
                .unwrap_or(0);
            if self.depth.get(&id) == Some(&computed) {
                continue;
            }
            self.depth.insert(id, computed);
            queue.extend(self.children.get(&id).into_iter().flatten());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    fn chain(g: &mut DepGraph, ids: &[u32]) {
        for &i in ids {
            g.add_node(n(i));
        }
        for pair in ids.windows(2) {
            assert!(g.add_edge(n(pair[0]), n(pair[1])));
        }
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut g = DepGraph::new();
        g.add_node(n(1));
        assert!(!g.add_edge(n(1), n(1)));
    }

    #[test]
    fn cycle_is_rejected_and_graph_unchanged() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2, 3]);
        assert!(!g.add_edge(n(3), n(1)));
        assert!(g.children_of(n(3)).next().is_none());
        assert_eq!(g.depth(n(1)), 0);
        assert_eq!(g.depth(n(3)), 2);
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2]);
        assert!(!g.add_edge(n(2), n(1)));
        assert!(g.children_of(n(1)).eq([n(2)]));
    }

    #[test]
    fn depth_follows_longest_parent_chain() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2, 3]);
        g.add_node(n(4));
        // 4 → 3 makes 3's depth max(depth(2), depth(4)) + 1 = 2 still.
        assert!(g.add_edge(n(4), n(3)));
        assert_eq!(g.depth(n(3)), 2);
        // Lengthen the 4-side: 1 → 4 pushes 4 to depth 1, 3 stays at 2.
        assert!(g.add_edge(n(1), n(4)));
        assert_eq!(g.depth(n(4)), 1);
        assert_eq!(g.depth(n(3)), 2);
        // 2 → 4 pushes 4 to 2 and cascades 3 to 3.
        assert!(g.add_edge(n(2), n(4)));
        assert_eq!(g.depth(n(4)), 2);
        assert_eq!(g.depth(n(3)), 3);
    }

    #[test]
    fn roots_track_parentless_nodes() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2]);
        assert!(g.roots().contains(&n(1)));
        assert!(!g.roots().contains(&n(2)));
        g.remove_edge(n(1), n(2));
        assert!(g.roots().contains(&n(2)));
        assert_eq!(g.depth(n(2)), 0);
    }

    #[test]
    fn remove_node_promotes_orphans() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2, 3]);
        g.remove_node(n(2));
        assert!(!g.has_node(n(2)));
        assert!(g.roots().contains(&n(3)));
        assert_eq!(g.depth(n(3)), 0);
        assert!(g.children_of(n(1)).next().is_none());
    }

    #[test]
    fn expand_dirty_only_filters_members() {
        let mut g = DepGraph::new();
        g.add_node(n(1));
        let out = g.expand_by_traversal([n(1), n(99)], Traversal::DirtyOnly);
        assert_eq!(out, [n(1)].into());
    }

    #[test]
    fn expand_down_from_mid_chain() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2, 3, 4, 5]);
        let out = g.expand_by_traversal([n(3)], Traversal::DirtyAndDown);
        assert_eq!(out, [n(3), n(4), n(5)].into());
    }

    #[test]
    fn expand_up_from_leaf() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2, 3]);
        let out = g.expand_by_traversal([n(3)], Traversal::DirtyAndUp);
        assert_eq!(out, [n(1), n(2), n(3)].into());
    }

    #[test]
    fn expand_all_ignores_base() {
        let mut g = DepGraph::new();
        chain(&mut g, &[1, 2]);
        g.add_node(n(7));
        let out = g.expand_by_traversal(Vec::<NodeId>::new(), Traversal::All);
        assert_eq!(out, [n(1), n(2), n(7)].into());
    }

    #[test]
    fn diamond_expansion_visits_each_node_once() {
        let mut g = DepGraph::new();
        for i in 1..=4 {
            g.add_node(n(i));
        }
        assert!(g.add_edge(n(1), n(2)));
        assert!(g.add_edge(n(1), n(3)));
        assert!(g.add_edge(n(2), n(4)));
        assert!(g.add_edge(n(3), n(4)));
        assert_eq!(g.depth(n(4)), 2);
        let out = g.expand_by_traversal([n(1)], Traversal::DirtyAndDown);
        assert_eq!(out.len(), 4);
    }
}
