//! Ancestry and path queries over a containment graph.
//!
//! # Responsibility
//! - Answer upward navigation questions (shortest path to an ancestor,
//!   shortest path through a required node, user breadcrumb).
//! - Enumerate descendants once each despite shared sub-DAGs.
//!
//! # Invariants
//! - Queries never mutate the graph.
//! - Upward paths are ordered from the ancestor down to the start node,
//!   both ends included.
//! - Unknown or unreachable endpoints yield an empty path, never an error.

use super::containment::ContainmentGraph;
use super::edge::Edge;
use super::node::{GraphNode, NodeId, UserId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Ordered node trail, top-most node first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePath(Vec<NodeId>);

impl NodePath {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    /// Top-most node (the ancestor or root end).
    pub fn first(&self) -> Option<NodeId> {
        self.0.first().copied()
    }

    /// Bottom-most node (the start end).
    pub fn last(&self) -> Option<NodeId> {
        self.0.last().copied()
    }
}

/// Read-only query helper bound to one graph snapshot.
pub struct PathFinder<'g, P> {
    graph: &'g ContainmentGraph<P>,
}

impl<'g, P> PathFinder<'g, P> {
    pub fn new(graph: &'g ContainmentGraph<P>) -> Self {
        Self { graph }
    }

    /// Shortest upward path from `start` to `target`.
    ///
    /// Returns `[start]` when both are equal and an empty path when
    /// `target` is not an ancestor of `start`.
    pub fn shortest_path_to_ancestor(&self, start: NodeId, target: NodeId) -> NodePath {
        self.ascend(start, |node| node.id() == target, |_, _| true)
            .map_or_else(NodePath::empty, NodePath)
    }

    /// Shortest upward path from `start` to `target` that contains `required`.
    ///
    /// Edges for which `edge_filter` returns `false` are not walked. Returns
    /// an empty path when no qualifying path exists, even if a path that
    /// skips `required` does.
    pub fn shortest_path_to_ancestor_via(
        &self,
        start: NodeId,
        target: NodeId,
        required: NodeId,
        edge_filter: Option<&dyn Fn(&Edge) -> bool>,
    ) -> NodePath {
        let usable = |_: NodeId, edge: &Edge| edge_filter.map_or(true, |filter| filter(edge));

        // In a DAG the two legs can only share `required`.
        let Some(lower) = self.ascend(start, |node| node.id() == required, usable) else {
            return NodePath::empty();
        };
        let Some(mut upper) = self.ascend(required, |node| node.id() == target, usable) else {
            return NodePath::empty();
        };
        upper.extend(lower.into_iter().skip(1));
        NodePath(upper)
    }

    /// Trail from `user`'s root down to `start`.
    ///
    /// Parent edges for which `terminate(current, edge)` holds are skipped.
    /// The walk is breadth-first, so the closest reachable root wins and
    /// the trail is a shortest one. Returns an empty path when no root for
    /// `user` is reachable.
    pub fn breadcrumb_for_user<F>(&self, start: NodeId, user: UserId, terminate: F) -> NodePath
    where
        F: Fn(NodeId, &Edge) -> bool,
    {
        self.ascend(
            start,
            |node| node.is_root_for(user),
            |current, edge| !terminate(current, edge),
        )
        .map_or_else(NodePath::empty, NodePath)
    }

    /// Every node reachable downward from `start`, each exactly once.
    ///
    /// `start` itself is not included. Soft-deleted edges are followed only
    /// when `include_deleted` is set.
    pub fn flatten_descendants(&self, start: NodeId, include_deleted: bool) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for edge in self.graph.children(current, include_deleted) {
                if seen.insert(edge.child()) {
                    stack.push(edge.child());
                }
            }
        }
        seen
    }

    /// Every node reachable upward from `start` over any edge.
    pub fn ancestors(&self, start: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let Some(node) = self.graph.node(current) else {
                continue;
            };
            for parent in node.parent_ids() {
                if seen.insert(*parent) {
                    stack.push(*parent);
                }
            }
        }
        seen
    }

    /// Returns whether `candidate` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, node: NodeId, candidate: NodeId) -> bool {
        node != candidate
            && self
                .ascend(node, |current| current.id() == candidate, |_, _| true)
                .is_some()
    }

    /// Breadth-first upward search.
    ///
    /// Returns the trail from the first node satisfying `is_goal` down to
    /// `start`, walking only edges accepted by `usable(current, edge)`.
    fn ascend<G, U>(&self, start: NodeId, is_goal: G, usable: U) -> Option<Vec<NodeId>>
    where
        G: Fn(&GraphNode<P>) -> bool,
        U: Fn(NodeId, &Edge) -> bool,
    {
        let start_node = self.graph.node(start)?;
        if is_goal(start_node) {
            return Some(vec![start]);
        }

        let mut reached_from: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.graph.node(current) else {
                continue;
            };
            for parent in node.parent_ids() {
                let Some(edge) = self.graph.edge(*parent, current) else {
                    continue;
                };
                if !usable(current, edge) || !visited.insert(*parent) {
                    continue;
                }
                reached_from.insert(*parent, current);

                let Some(parent_node) = self.graph.node(*parent) else {
                    continue;
                };
                if is_goal(parent_node) {
                    return Some(trail_down(*parent, &reached_from));
                }
                queue.push_back(*parent);
            }
        }
        None
    }
}

fn trail_down(top: NodeId, reached_from: &HashMap<NodeId, NodeId>) -> Vec<NodeId> {
    let mut trail = vec![top];
    let mut cursor = top;
    while let Some(next) = reached_from.get(&cursor) {
        trail.push(*next);
        cursor = *next;
    }
    trail
}
