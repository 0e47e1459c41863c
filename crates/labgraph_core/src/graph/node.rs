//! Graph node model.
//!
//! # Responsibility
//! - Hold node identity, payload, capability and incidence lists.
//!
//! # Invariants
//! - `id` is stable and never reused for another node.
//! - Equality and hashing use `id` only; the payload never participates.
//! - Incidence lists are only mutated by the owning `ContainmentGraph`.

use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Stable node identifier.
pub type NodeId = Uuid;

/// Stable identifier of an acting user or root owner.
pub type UserId = Uuid;

/// Node capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Node that may hold children.
    Container,
    /// Node that can only be held.
    Leaf,
}

/// Addressable unit of the containment hierarchy.
#[derive(Debug, Clone)]
pub struct GraphNode<P> {
    id: NodeId,
    kind: NodeKind,
    payload: P,
    root_owner: Option<UserId>,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl<P> GraphNode<P> {
    pub(crate) fn new(id: NodeId, kind: NodeKind, payload: P) -> Self {
        Self {
            id,
            kind,
            payload,
            root_owner: None,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns whether this node may be the parent endpoint of an edge.
    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// User whose personal hierarchy this node tops, if any.
    pub fn root_owner(&self) -> Option<UserId> {
        self.root_owner
    }

    /// Returns whether this node is the root of `user`'s hierarchy.
    pub fn is_root_for(&self, user: UserId) -> bool {
        self.root_owner == Some(user)
    }

    pub(crate) fn set_root_owner(&mut self, owner: Option<UserId>) -> Option<UserId> {
        std::mem::replace(&mut self.root_owner, owner)
    }

    /// Direct parents in attach order, soft-deleted edges included.
    pub fn parent_ids(&self) -> &[NodeId] {
        &self.parents
    }

    /// Direct children in attach order, soft-deleted edges included.
    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns whether no edge touches this node.
    pub fn is_isolated(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty()
    }
}

impl<P> PartialEq for GraphNode<P> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<P> Eq for GraphNode<P> {}

impl<P> Hash for GraphNode<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
