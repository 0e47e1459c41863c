//! Thread-shared containment graph handle.
//!
//! # Responsibility
//! - Serialize mutations against one working set.
//! - Give readers a consistent view while no mutation is in flight.
//! - Hand out query-only views that cannot bypass the owner of the graph.
//!
//! # Invariants
//! - Every mutation, including its ancestor check, runs under the write lock.
//! - The public mutation wrappers either commit fully or panic before
//!   touching the graph, so a lock poisoned by them still guards a
//!   consistent graph and is recovered rather than propagated.
//! - Arbitrary write closures stay crate-internal; their callers restore
//!   the graph themselves before returning an error.

use super::containment::{AttachError, ContainmentGraph, EdgeNotFound, MoveError};
use super::edge::Edge;
use super::node::{NodeId, UserId};
use super::path::NodePath;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Cloneable handle to one lock-guarded graph.
#[derive(Debug)]
pub struct SharedGraph<P> {
    inner: Arc<RwLock<ContainmentGraph<P>>>,
}

impl<P> Clone for SharedGraph<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> Default for SharedGraph<P> {
    fn default() -> Self {
        Self::new(ContainmentGraph::new())
    }
}

impl<P> SharedGraph<P> {
    pub fn new(graph: ContainmentGraph<P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    /// Runs `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ContainmentGraph<P>) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Runs `f` under the write lock.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut ContainmentGraph<P>) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Detached copy of the current working set.
    pub fn snapshot(&self) -> ContainmentGraph<P>
    where
        P: Clone,
    {
        self.read(ContainmentGraph::clone)
    }

    /// Query-only handle onto the same graph.
    pub fn view(&self) -> GraphView<P> {
        GraphView {
            shared: self.clone(),
        }
    }

    pub fn attach_child(
        &self,
        parent: NodeId,
        child: NodeId,
        acting_user: UserId,
    ) -> Result<Edge, AttachError> {
        self.write(|graph| graph.attach_child(parent, child, acting_user))
    }

    pub fn detach_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.write(|graph| graph.detach_child(parent, child))
    }

    pub fn move_node(
        &self,
        node: NodeId,
        from: Option<NodeId>,
        to: NodeId,
        acting_user: UserId,
    ) -> Result<Edge, MoveError> {
        self.write(|graph| graph.move_node(node, from, to, acting_user))
    }

    /// # Panics
    /// Panics when `child` is not a direct child of `parent`.
    pub fn toggle_deleted(&self, parent: NodeId, child: NodeId, mark_deleted: bool) -> bool {
        self.write(|graph| graph.toggle_deleted(parent, child, mark_deleted))
    }

    pub fn try_toggle_deleted(
        &self,
        parent: NodeId,
        child: NodeId,
        mark_deleted: bool,
    ) -> Result<bool, EdgeNotFound> {
        self.write(|graph| graph.try_toggle_deleted(parent, child, mark_deleted))
    }

    pub fn shortest_path_to_ancestor(&self, start: NodeId, target: NodeId) -> NodePath {
        self.read(|graph| graph.path_finder().shortest_path_to_ancestor(start, target))
    }

    pub fn shortest_path_to_ancestor_via(
        &self,
        start: NodeId,
        target: NodeId,
        required: NodeId,
        edge_filter: Option<&dyn Fn(&Edge) -> bool>,
    ) -> NodePath {
        self.read(|graph| {
            graph
                .path_finder()
                .shortest_path_to_ancestor_via(start, target, required, edge_filter)
        })
    }

    pub fn breadcrumb_for_user<F>(&self, start: NodeId, user: UserId, terminate: F) -> NodePath
    where
        F: Fn(NodeId, &Edge) -> bool,
    {
        self.read(|graph| graph.path_finder().breadcrumb_for_user(start, user, terminate))
    }

    pub fn flatten_descendants(&self, start: NodeId, include_deleted: bool) -> HashSet<NodeId> {
        self.read(|graph| graph.path_finder().flatten_descendants(start, include_deleted))
    }
}

/// Query-only handle to a shared graph.
///
/// Sees every committed mutation of the graph it was taken from, but has no
/// way to change it.
#[derive(Debug)]
pub struct GraphView<P> {
    shared: SharedGraph<P>,
}

impl<P> Clone for GraphView<P> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<P> GraphView<P> {
    /// Runs `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ContainmentGraph<P>) -> R) -> R {
        self.shared.read(f)
    }

    /// Detached copy; edits to it never reach the shared graph.
    pub fn snapshot(&self) -> ContainmentGraph<P>
    where
        P: Clone,
    {
        self.shared.snapshot()
    }

    pub fn shortest_path_to_ancestor(&self, start: NodeId, target: NodeId) -> NodePath {
        self.shared.shortest_path_to_ancestor(start, target)
    }

    pub fn shortest_path_to_ancestor_via(
        &self,
        start: NodeId,
        target: NodeId,
        required: NodeId,
        edge_filter: Option<&dyn Fn(&Edge) -> bool>,
    ) -> NodePath {
        self.shared
            .shortest_path_to_ancestor_via(start, target, required, edge_filter)
    }

    pub fn breadcrumb_for_user<F>(&self, start: NodeId, user: UserId, terminate: F) -> NodePath
    where
        F: Fn(NodeId, &Edge) -> bool,
    {
        self.shared.breadcrumb_for_user(start, user, terminate)
    }

    pub fn flatten_descendants(&self, start: NodeId, include_deleted: bool) -> HashSet<NodeId> {
        self.shared.flatten_descendants(start, include_deleted)
    }
}
