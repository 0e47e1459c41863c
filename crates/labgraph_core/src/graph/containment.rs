//! Containment graph arena and mutation operations.
//!
//! # Responsibility
//! - Own every node and edge of one working set, keyed by stable identity.
//! - Enforce the DAG invariants on attach, detach, move and soft-delete.
//!
//! # Invariants
//! - Every edge is registered in exactly two incidence lists: the parent's
//!   children and the child's parents.
//! - Only container nodes appear as edge parents.
//! - A refused mutation leaves nodes, edges and incidence order untouched.

use super::edge::{Edge, EdgeKey};
use super::node::{GraphNode, NodeId, NodeKind, UserId};
use super::path::PathFinder;
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Structural refusal from [`ContainmentGraph::attach_child`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachError {
    /// Parent and child are the same node.
    SelfReference(NodeId),
    /// Child is already an ancestor of parent.
    CycleDetected { parent: NodeId, child: NodeId },
    /// An edge for the pair exists already, whoever owns it.
    DuplicateEdge { parent: NodeId, child: NodeId },
    /// Endpoint is not part of this working set.
    UnknownNode(NodeId),
    /// Parent is a leaf node.
    NotAContainer(NodeId),
}

impl Display for AttachError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfReference(id) => write!(f, "node cannot contain itself: {id}"),
            Self::CycleDetected { parent, child } => write!(
                f,
                "attach would create cycle: node {child} is an ancestor of {parent}"
            ),
            Self::DuplicateEdge { parent, child } => {
                write!(f, "edge already exists: {parent} -> {child}")
            }
            Self::UnknownNode(id) => write!(f, "graph node not found: {id}"),
            Self::NotAContainer(id) => write!(f, "graph node cannot hold children: {id}"),
        }
    }
}

impl Error for AttachError {}

/// Structural refusal from [`ContainmentGraph::move_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// `from` is not a direct parent of the moved node.
    NotDirectParent { node: NodeId, from: NodeId },
    /// Attaching under the destination was refused.
    Attach(AttachError),
}

impl Display for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDirectParent { node, from } => {
                write!(f, "node {node} is not directly inside {from}")
            }
            Self::Attach(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MoveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotDirectParent { .. } => None,
            Self::Attach(err) => Some(err),
        }
    }
}

impl From<AttachError> for MoveError {
    fn from(value: AttachError) -> Self {
        Self::Attach(value)
    }
}

/// No edge exists for the given pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeNotFound(pub EdgeKey);

impl Display for EdgeNotFound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "edge not found: {}", self.0)
    }
}

impl Error for EdgeNotFound {}

/// Node lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this id is already loaded.
    DuplicateNode(NodeId),
    /// Node is not part of this working set.
    NodeNotFound(NodeId),
    /// Node still has parents or children.
    NodeHasEdges(NodeId),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNode(id) => write!(f, "graph node already exists: {id}"),
            Self::NodeNotFound(id) => write!(f, "graph node not found: {id}"),
            Self::NodeHasEdges(id) => write!(f, "graph node still has edges: {id}"),
        }
    }
}

impl Error for GraphError {}

/// Edge taken out of the graph together with its incidence positions.
struct Unlinked {
    edge: Edge,
    parent_slot: usize,
    child_slot: usize,
}

/// Revert token for one successful move.
pub(crate) struct MoveUndo {
    added: EdgeKey,
    detached: Option<Unlinked>,
}

/// In-memory working set of the containment hierarchy.
#[derive(Debug, Clone)]
pub struct ContainmentGraph<P> {
    nodes: HashMap<NodeId, GraphNode<P>>,
    edges: HashMap<EdgeKey, Edge>,
}

impl<P> Default for ContainmentGraph<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ContainmentGraph<P> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Adds a container node with a generated id.
    pub fn add_container(&mut self, payload: P) -> NodeId {
        self.add_generated(NodeKind::Container, payload)
    }

    /// Adds a leaf node with a generated id.
    pub fn add_leaf(&mut self, payload: P) -> NodeId {
        self.add_generated(NodeKind::Leaf, payload)
    }

    /// Adds a node with a caller-provided id.
    ///
    /// Used by load paths where identity already exists in storage.
    pub fn insert_node(
        &mut self,
        id: NodeId,
        kind: NodeKind,
        payload: P,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id, GraphNode::new(id, kind, payload));
        Ok(())
    }

    /// Removes an isolated node and returns it.
    ///
    /// # Errors
    /// - `NodeNotFound` when `id` is unknown.
    /// - `NodeHasEdges` while any edge still touches the node.
    pub fn remove_node(&mut self, id: NodeId) -> Result<GraphNode<P>, GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
        if !node.is_isolated() {
            return Err(GraphError::NodeHasEdges(id));
        }
        self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Sets or clears the root-for-user marker; returns the previous marker.
    pub fn mark_root(
        &mut self,
        id: NodeId,
        owner: Option<UserId>,
    ) -> Result<Option<UserId>, GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
        Ok(node.set_root_owner(owner))
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode<P>> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, parent: NodeId, child: NodeId) -> Option<&Edge> {
        self.edges.get(&EdgeKey::new(parent, child))
    }

    /// Outgoing edges of `parent` in attach order.
    pub fn children(&self, parent: NodeId, include_deleted: bool) -> Vec<&Edge> {
        let Some(node) = self.nodes.get(&parent) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|child| self.edges.get(&EdgeKey::new(parent, *child)))
            .filter(|edge| include_deleted || edge.is_active())
            .collect()
    }

    /// Incoming edges of `child` in attach order.
    pub fn parents(&self, child: NodeId, include_deleted: bool) -> Vec<&Edge> {
        let Some(node) = self.nodes.get(&child) else {
            return Vec::new();
        };
        node.parents
            .iter()
            .filter_map(|parent| self.edges.get(&EdgeKey::new(*parent, child)))
            .filter(|edge| include_deleted || edge.is_active())
            .collect()
    }

    /// Nodes flagged as the root of `user`'s hierarchy.
    pub fn roots_for(&self, user: UserId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.is_root_for(user))
            .map(GraphNode::id)
            .collect()
    }

    pub fn path_finder(&self) -> PathFinder<'_, P> {
        PathFinder::new(self)
    }

    /// Attaches `child` under `parent` on behalf of `acting_user`.
    ///
    /// The ancestor check and the insert happen under the same `&mut`
    /// borrow, so no other mutation can interleave.
    ///
    /// # Errors
    /// - `UnknownNode` when either endpoint is absent.
    /// - `SelfReference` when `parent == child`.
    /// - `NotAContainer` when `parent` is a leaf.
    /// - `DuplicateEdge` when the pair is already linked, by any owner.
    /// - `CycleDetected` when `child` is already an ancestor of `parent`.
    pub fn attach_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        acting_user: UserId,
    ) -> Result<Edge, AttachError> {
        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or(AttachError::UnknownNode(parent))?;
        if !self.nodes.contains_key(&child) {
            return Err(AttachError::UnknownNode(child));
        }
        if parent == child {
            return Err(AttachError::SelfReference(child));
        }
        if !parent_node.is_container() {
            return Err(AttachError::NotAContainer(parent));
        }

        let key = EdgeKey::new(parent, child);
        if self.edges.contains_key(&key) {
            return Err(AttachError::DuplicateEdge { parent, child });
        }
        if self.path_finder().is_ancestor(parent, child) {
            debug!(
                "event=edge_attach module=graph status=rejected reason=cycle parent={parent} child={child}"
            );
            return Err(AttachError::CycleDetected { parent, child });
        }

        let edge = Edge::new(key, acting_user);
        self.link(edge.clone(), None);
        debug!("event=edge_attach module=graph status=ok parent={parent} child={child}");
        Ok(edge)
    }

    /// Re-creates a persisted edge, checking the same invariants as attach.
    pub fn restore_edge(
        &mut self,
        parent: NodeId,
        child: NodeId,
        owner: UserId,
        deleted: bool,
    ) -> Result<Edge, AttachError> {
        self.attach_child(parent, child, owner)?;
        let key = EdgeKey::new(parent, child);
        let edge = self
            .edges
            .get_mut(&key)
            .ok_or(AttachError::UnknownNode(child))?;
        edge.toggle_deleted(deleted);
        Ok(edge.clone())
    }

    /// Removes the edge `parent -> child`.
    ///
    /// Returns `false` when no such edge exists.
    pub fn detach_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let removed = self.unlink(EdgeKey::new(parent, child)).is_some();
        if removed {
            debug!("event=edge_detach module=graph status=ok parent={parent} child={child}");
        }
        removed
    }

    /// Re-parents `node` from `from` (when given) to `to`.
    ///
    /// Without `from` this only adds `to` as another parent.
    ///
    /// # Errors
    /// - `NotDirectParent` when `from` is not a direct parent of `node`.
    /// - `Attach(..)` when `to` refuses the node; the edge from `from` is
    ///   restored with its owner, flag and incidence positions.
    pub fn move_node(
        &mut self,
        node: NodeId,
        from: Option<NodeId>,
        to: NodeId,
        acting_user: UserId,
    ) -> Result<Edge, MoveError> {
        self.move_node_undoable(node, from, to, acting_user)
            .map(|(edge, _)| edge)
    }

    /// Same as [`ContainmentGraph::move_node`], also returning what
    /// [`ContainmentGraph::undo_move`] needs to revert it.
    pub(crate) fn move_node_undoable(
        &mut self,
        node: NodeId,
        from: Option<NodeId>,
        to: NodeId,
        acting_user: UserId,
    ) -> Result<(Edge, MoveUndo), MoveError> {
        let detached = match from {
            Some(from) => Some(
                self.unlink(EdgeKey::new(from, node))
                    .ok_or(MoveError::NotDirectParent { node, from })?,
            ),
            None => None,
        };

        match self.attach_child(to, node, acting_user) {
            Ok(edge) => {
                debug!("event=node_move module=graph status=ok node={node} to={to}");
                let undo = MoveUndo {
                    added: edge.key(),
                    detached,
                };
                Ok((edge, undo))
            }
            Err(err) => {
                if let Some(unlinked) = detached {
                    self.relink(unlinked);
                }
                debug!("event=node_move module=graph status=rejected node={node} to={to}");
                Err(err.into())
            }
        }
    }

    /// Reverts a successful move: drops the new edge and puts the old one
    /// back into its original incidence slots.
    pub(crate) fn undo_move(&mut self, undo: MoveUndo) {
        self.unlink(undo.added);
        if let Some(unlinked) = undo.detached {
            self.relink(unlinked);
        }
    }

    /// Sets the soft-delete flag of `parent -> child`; returns the new state.
    ///
    /// # Panics
    /// Panics when `child` is not a direct child of `parent`. Use
    /// [`ContainmentGraph::try_toggle_deleted`] where the pair may be stale.
    pub fn toggle_deleted(&mut self, parent: NodeId, child: NodeId, mark_deleted: bool) -> bool {
        match self.try_toggle_deleted(parent, child, mark_deleted) {
            Ok(state) => state,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible form of [`ContainmentGraph::toggle_deleted`].
    pub fn try_toggle_deleted(
        &mut self,
        parent: NodeId,
        child: NodeId,
        mark_deleted: bool,
    ) -> Result<bool, EdgeNotFound> {
        let key = EdgeKey::new(parent, child);
        self.edges
            .get_mut(&key)
            .map(|edge| edge.toggle_deleted(mark_deleted))
            .ok_or(EdgeNotFound(key))
    }

    fn add_generated(&mut self, kind: NodeKind, payload: P) -> NodeId {
        let id = Uuid::new_v4();
        self.nodes.insert(id, GraphNode::new(id, kind, payload));
        id
    }

    fn link(&mut self, edge: Edge, slots: Option<(usize, usize)>) {
        let key = edge.key();
        if let Some(parent) = self.nodes.get_mut(&key.parent) {
            insert_id(&mut parent.children, key.child, slots.map(|(slot, _)| slot));
        }
        if let Some(child) = self.nodes.get_mut(&key.child) {
            insert_id(&mut child.parents, key.parent, slots.map(|(_, slot)| slot));
        }
        self.edges.insert(key, edge);
    }

    fn unlink(&mut self, key: EdgeKey) -> Option<Unlinked> {
        let edge = self.edges.remove(&key)?;
        let parent_slot = self
            .nodes
            .get_mut(&key.parent)
            .map_or(0, |parent| remove_id(&mut parent.children, key.child));
        let child_slot = self
            .nodes
            .get_mut(&key.child)
            .map_or(0, |child| remove_id(&mut child.parents, key.parent));
        Some(Unlinked {
            edge,
            parent_slot,
            child_slot,
        })
    }

    fn relink(&mut self, unlinked: Unlinked) {
        let Unlinked {
            edge,
            parent_slot,
            child_slot,
        } = unlinked;
        self.link(edge, Some((parent_slot, child_slot)));
    }
}

fn insert_id(list: &mut Vec<NodeId>, id: NodeId, slot: Option<usize>) {
    match slot {
        Some(slot) => list.insert(slot.min(list.len()), id),
        None => list.push(id),
    }
}

fn remove_id(list: &mut Vec<NodeId>, id: NodeId) -> usize {
    match list.iter().position(|current| *current == id) {
        Some(index) => {
            list.remove(index);
            index
        }
        None => list.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::{AttachError, ContainmentGraph, GraphError, MoveError};
    use crate::graph::NodeKind;
    use uuid::Uuid;

    #[test]
    fn leaf_cannot_hold_children() {
        let user = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let doc = graph.add_leaf("doc");
        let folder = graph.add_container("folder");

        assert_eq!(
            graph.attach_child(doc, folder, user),
            Err(AttachError::NotAContainer(doc))
        );
        assert!(graph.attach_child(folder, doc, user).is_ok());
    }

    #[test]
    fn unknown_endpoints_are_refused() {
        let user = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let folder = graph.add_container("folder");
        let ghost = Uuid::new_v4();

        assert_eq!(
            graph.attach_child(folder, ghost, user),
            Err(AttachError::UnknownNode(ghost))
        );
        assert_eq!(
            graph.attach_child(ghost, folder, user),
            Err(AttachError::UnknownNode(ghost))
        );
    }

    #[test]
    fn failed_move_restores_incidence_order() {
        let user = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let a = graph.add_container("a");
        let b = graph.add_container("b");
        let c = graph.add_container("c");
        let node = graph.add_container("node");
        let sibling = graph.add_container("sibling");
        graph.attach_child(a, node, user).unwrap();
        graph.attach_child(b, node, user).unwrap();
        graph.attach_child(c, node, user).unwrap();
        graph.attach_child(a, sibling, user).unwrap();
        graph.toggle_deleted(a, node, true);

        let before_parents = graph.node(node).unwrap().parent_ids().to_vec();
        let before_children = graph.node(a).unwrap().child_ids().to_vec();

        let err = graph.move_node(node, Some(a), node, Uuid::new_v4()).unwrap_err();
        assert_eq!(err, MoveError::Attach(AttachError::SelfReference(node)));

        assert_eq!(graph.node(node).unwrap().parent_ids(), before_parents.as_slice());
        assert_eq!(graph.node(a).unwrap().child_ids(), before_children.as_slice());
        let restored = graph.edge(a, node).unwrap();
        assert_eq!(restored.owner(), user);
        assert!(restored.is_deleted());
    }

    #[test]
    fn undo_move_puts_old_edge_back_in_place() {
        let owner = Uuid::new_v4();
        let mover = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let a = graph.add_container("a");
        let b = graph.add_container("b");
        let target = graph.add_container("target");
        let node = graph.add_container("node");
        let sibling = graph.add_container("sibling");
        graph.attach_child(a, node, owner).unwrap();
        graph.attach_child(b, node, owner).unwrap();
        graph.attach_child(a, sibling, owner).unwrap();
        graph.toggle_deleted(a, node, true);
        let before_parents = graph.node(node).unwrap().parent_ids().to_vec();
        let before_children = graph.node(a).unwrap().child_ids().to_vec();

        let (edge, undo) = graph
            .move_node_undoable(node, Some(a), target, mover)
            .unwrap();
        assert_eq!(edge.owner(), mover);
        graph.undo_move(undo);

        assert!(graph.edge(target, node).is_none());
        assert!(graph.node(target).unwrap().child_ids().is_empty());
        assert_eq!(graph.node(node).unwrap().parent_ids(), before_parents.as_slice());
        assert_eq!(graph.node(a).unwrap().child_ids(), before_children.as_slice());
        let restored = graph.edge(a, node).unwrap();
        assert_eq!(restored.owner(), owner);
        assert!(restored.is_deleted());
    }

    #[test]
    fn undo_move_to_same_parent_restores_original_edge() {
        let owner = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let a = graph.add_container("a");
        let node = graph.add_container("node");
        let sibling = graph.add_container("sibling");
        graph.attach_child(a, node, owner).unwrap();
        graph.attach_child(a, sibling, owner).unwrap();

        let (_, undo) = graph
            .move_node_undoable(node, Some(a), a, Uuid::new_v4())
            .unwrap();
        assert_eq!(graph.node(a).unwrap().child_ids(), &[sibling, node]);
        graph.undo_move(undo);

        assert_eq!(graph.node(a).unwrap().child_ids(), &[node, sibling]);
        assert_eq!(graph.edge(a, node).unwrap().owner(), owner);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn restore_edge_keeps_flag_and_checks_invariants() {
        let owner = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let a = graph.add_container("a");
        let b = graph.add_container("b");

        let edge = graph.restore_edge(a, b, owner, true).unwrap();
        assert!(edge.is_deleted());
        assert_eq!(edge.owner(), owner);
        assert_eq!(
            graph.restore_edge(b, a, owner, false),
            Err(AttachError::CycleDetected { parent: b, child: a })
        );
    }

    #[test]
    fn remove_node_requires_isolation() {
        let user = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let a = graph.add_container("a");
        let b = graph.add_container("b");
        graph.attach_child(a, b, user).unwrap();

        assert_eq!(graph.remove_node(b).unwrap_err(), GraphError::NodeHasEdges(b));
        assert!(graph.detach_child(a, b));
        let removed = graph.remove_node(b).unwrap();
        assert_eq!(*removed.payload(), "b");
        assert_eq!(graph.remove_node(b).unwrap_err(), GraphError::NodeNotFound(b));
    }

    #[test]
    fn insert_node_rejects_reused_id() {
        let mut graph = ContainmentGraph::new();
        let id = Uuid::new_v4();
        graph.insert_node(id, NodeKind::Container, "first").unwrap();
        assert_eq!(
            graph.insert_node(id, NodeKind::Leaf, "second"),
            Err(GraphError::DuplicateNode(id))
        );
        assert_eq!(*graph.node(id).unwrap().payload(), "first");
    }

    #[test]
    fn listing_filters_soft_deleted_edges() {
        let user = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let parent = graph.add_container("parent");
        let kept = graph.add_container("kept");
        let binned = graph.add_container("binned");
        graph.attach_child(parent, kept, user).unwrap();
        graph.attach_child(parent, binned, user).unwrap();
        graph.toggle_deleted(parent, binned, true);

        let visible: Vec<_> = graph.children(parent, false).iter().map(|e| e.child()).collect();
        assert_eq!(visible, vec![kept]);
        assert_eq!(graph.children(parent, true).len(), 2);
        assert!(graph.parents(binned, false).is_empty());
        assert_eq!(graph.parents(binned, true).len(), 1);
    }

    #[test]
    fn roots_for_finds_marked_nodes() {
        let user = Uuid::new_v4();
        let mut graph = ContainmentGraph::new();
        let home = graph.add_container("home");
        graph.add_container("other");
        assert_eq!(graph.mark_root(home, Some(user)).unwrap(), None);
        assert_eq!(graph.roots_for(user), vec![home]);
        assert_eq!(graph.mark_root(home, None).unwrap(), Some(user));
        assert!(graph.roots_for(user).is_empty());
    }
}
