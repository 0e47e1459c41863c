//! Containment edge model.
//!
//! # Invariants
//! - Endpoints and owner are fixed at creation.
//! - Edges are only created by `ContainmentGraph::attach_child`, which
//!   registers them on both endpoints.

use super::node::{NodeId, UserId};
use std::fmt::{Display, Formatter};

/// Unique key of an edge: one edge per `(parent, child)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub parent: NodeId,
    pub child: NodeId,
}

impl EdgeKey {
    pub fn new(parent: NodeId, child: NodeId) -> Self {
        Self { parent, child }
    }
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

/// Directed "is located inside" relation from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    key: EdgeKey,
    owner: UserId,
    deleted: bool,
}

impl Edge {
    pub(crate) fn new(key: EdgeKey, owner: UserId) -> Self {
        Self {
            key,
            owner,
            deleted: false,
        }
    }

    pub fn key(&self) -> EdgeKey {
        self.key
    }

    pub fn parent(&self) -> NodeId {
        self.key.parent
    }

    pub fn child(&self) -> NodeId {
        self.key.child
    }

    /// User who created the edge.
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Soft-delete (recycle bin) marker.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Sets the soft-delete flag and returns the new state.
    pub(crate) fn toggle_deleted(&mut self, mark_deleted: bool) -> bool {
        self.deleted = mark_deleted;
        self.deleted
    }
}
