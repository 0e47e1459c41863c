//! Lab containment graph use-case service.
//!
//! # Responsibility
//! - Apply graph mutations in memory and record them through the
//!   repository as one all-or-nothing step.
//! - Provide navigation helpers used by move dialogs and breadcrumbs.
//!
//! # Invariants
//! - Every mutation holds the shared graph's write lock until the
//!   repository has answered.
//! - A repository failure leaves the in-memory graph as it was before the
//!   call.
//! - Unit names are trimmed and never blank.
//! - Callers only ever see a query-only view of the graph, so every change
//!   to the working set goes through the repository.

use crate::graph::{
    AttachError, ContainmentGraph, Edge, EdgeKey, GraphError, GraphView, MoveError, NodeId,
    NodeKind, NodePath, SharedGraph, UserId,
};
use crate::model::unit::{LabUnit, UnitKind};
use crate::repo::graph_repo::{GraphRepoError, GraphRepository};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by graph service operations.
pub type GraphServiceResult<T> = Result<T, GraphServiceError>;

/// Errors from graph service operations.
#[derive(Debug)]
pub enum GraphServiceError {
    /// Unit name is blank after trim.
    InvalidName,
    /// Target node does not exist.
    NodeNotFound(NodeId),
    /// Target edge does not exist.
    EdgeNotFound(EdgeKey),
    /// Attach was structurally refused.
    Attach(AttachError),
    /// Move was structurally refused.
    Move(MoveError),
    /// Node lifecycle was refused.
    Graph(GraphError),
    /// Repository-level failure.
    Repo(GraphRepoError),
}

impl Display for GraphServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "unit name must not be blank"),
            Self::NodeNotFound(id) => write!(f, "graph node not found: {id}"),
            Self::EdgeNotFound(key) => write!(f, "graph edge not found: {key}"),
            Self::Attach(err) => write!(f, "{err}"),
            Self::Move(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Attach(err) => Some(err),
            Self::Move(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AttachError> for GraphServiceError {
    fn from(value: AttachError) -> Self {
        Self::Attach(value)
    }
}

impl From<MoveError> for GraphServiceError {
    fn from(value: MoveError) -> Self {
        Self::Move(value)
    }
}

impl From<GraphError> for GraphServiceError {
    fn from(value: GraphError) -> Self {
        match value {
            GraphError::NodeNotFound(id) => Self::NodeNotFound(id),
            other => Self::Graph(other),
        }
    }
}

impl From<GraphRepoError> for GraphServiceError {
    fn from(value: GraphRepoError) -> Self {
        match value {
            GraphRepoError::NodeNotFound(id) => Self::NodeNotFound(id),
            GraphRepoError::EdgeNotFound(key) => Self::EdgeNotFound(key),
            other => Self::Repo(other),
        }
    }
}

/// Containment graph service facade.
pub struct GraphService<R: GraphRepository> {
    repo: R,
    graph: SharedGraph<LabUnit>,
}

impl<R: GraphRepository> GraphService<R> {
    /// Loads the persisted working set and wraps it for shared access.
    pub fn load(repo: R) -> GraphServiceResult<Self> {
        let graph = repo.load_graph()?;
        Ok(Self {
            repo,
            graph: SharedGraph::new(graph),
        })
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Query-only handle for readers on any thread.
    pub fn graph(&self) -> GraphView<LabUnit> {
        self.graph.view()
    }

    /// Creates one unit with no parents.
    pub fn create_unit(
        &self,
        kind: UnitKind,
        name: impl Into<String>,
    ) -> GraphServiceResult<NodeId> {
        let unit = LabUnit::new(kind, normalize_name(name.into())?);
        self.graph.write(|graph| -> GraphServiceResult<NodeId> {
            let node_uuid = match kind.node_kind() {
                NodeKind::Container => graph.add_container(unit),
                NodeKind::Leaf => graph.add_leaf(unit),
            };
            self.persist_new_node(graph, node_uuid)?;
            info!(
                "event=unit_create module=service status=ok node={node_uuid} kind={}",
                kind.as_str()
            );
            Ok(node_uuid)
        })
    }

    /// Creates the personal root of `user`.
    pub fn create_user_root(
        &self,
        user: UserId,
        name: impl Into<String>,
    ) -> GraphServiceResult<NodeId> {
        let unit = LabUnit::new(UnitKind::UserRoot, normalize_name(name.into())?);
        self.graph.write(|graph| -> GraphServiceResult<NodeId> {
            let node_uuid = graph.add_container(unit);
            graph.mark_root(node_uuid, Some(user))?;
            self.persist_new_node(graph, node_uuid)?;
            info!("event=user_root_create module=service status=ok node={node_uuid}");
            Ok(node_uuid)
        })
    }

    /// Removes a unit that no longer has parents or children.
    pub fn remove_unit(&self, node_uuid: NodeId) -> GraphServiceResult<LabUnit> {
        self.graph.write(|graph| -> GraphServiceResult<LabUnit> {
            let node = graph
                .node(node_uuid)
                .ok_or(GraphServiceError::NodeNotFound(node_uuid))?;
            if !node.is_isolated() {
                return Err(GraphError::NodeHasEdges(node_uuid).into());
            }
            self.repo.delete_node(node_uuid)?;
            let removed = graph.remove_node(node_uuid)?;
            Ok(removed.payload().clone())
        })
    }

    /// Sets or clears the root-for-user marker of `node_uuid`.
    ///
    /// Returns the previous marker.
    pub fn mark_root(
        &self,
        node_uuid: NodeId,
        owner: Option<UserId>,
    ) -> GraphServiceResult<Option<UserId>> {
        self.graph.write(|graph| -> GraphServiceResult<Option<UserId>> {
            let previous = graph.mark_root(node_uuid, owner)?;
            if let Err(err) = self.repo.set_root_owner(node_uuid, owner) {
                graph.mark_root(node_uuid, previous)?;
                return Err(err.into());
            }
            info!(
                "event=root_mark module=service status=ok node={node_uuid} marked={}",
                owner.is_some()
            );
            Ok(previous)
        })
    }

    /// Attaches `child` under `parent` and records the edge.
    pub fn attach_child(
        &self,
        parent: NodeId,
        child: NodeId,
        acting_user: UserId,
    ) -> GraphServiceResult<Edge> {
        self.graph.write(|graph| -> GraphServiceResult<Edge> {
            let edge = graph.attach_child(parent, child, acting_user).map_err(|err| {
                warn!(
                    "event=graph_attach module=service status=rejected parent={parent} child={child} reason={err}"
                );
                err
            })?;
            if let Err(err) = self.repo.insert_edge(&edge) {
                graph.detach_child(parent, child);
                return Err(err.into());
            }
            info!("event=graph_attach module=service status=ok parent={parent} child={child}");
            Ok(edge)
        })
    }

    /// Detaches `child` from `parent`; `Ok(false)` when no edge existed.
    pub fn detach_child(&self, parent: NodeId, child: NodeId) -> GraphServiceResult<bool> {
        self.graph.write(|graph| -> GraphServiceResult<bool> {
            if graph.edge(parent, child).is_none() {
                return Ok(false);
            }
            self.repo.delete_edge(EdgeKey::new(parent, child))?;
            let removed = graph.detach_child(parent, child);
            info!("event=graph_detach module=service status=ok parent={parent} child={child}");
            Ok(removed)
        })
    }

    /// Moves `node` from `from` to `to` and records both edge changes.
    pub fn move_node(
        &self,
        node: NodeId,
        from: Option<NodeId>,
        to: NodeId,
        acting_user: UserId,
    ) -> GraphServiceResult<Edge> {
        self.graph.write(|graph| -> GraphServiceResult<Edge> {
            let (edge, undo) = graph
                .move_node_undoable(node, from, to, acting_user)
                .map_err(|err| {
                    warn!(
                        "event=graph_move module=service status=rejected node={node} to={to} reason={err}"
                    );
                    err
                })?;
            let removed = from.map(|from| EdgeKey::new(from, node));
            if let Err(err) = self.repo.move_edge(removed, &edge) {
                graph.undo_move(undo);
                return Err(err.into());
            }
            info!("event=graph_move module=service status=ok node={node} to={to}");
            Ok(edge)
        })
    }

    /// Sets the soft-delete flag of `parent -> child`; returns the new state.
    pub fn set_deleted(
        &self,
        parent: NodeId,
        child: NodeId,
        mark_deleted: bool,
    ) -> GraphServiceResult<bool> {
        let key = EdgeKey::new(parent, child);
        self.graph.write(|graph| -> GraphServiceResult<bool> {
            if graph.edge(parent, child).is_none() {
                return Err(GraphServiceError::EdgeNotFound(key));
            }
            self.repo.set_edge_deleted(key, mark_deleted)?;
            Ok(graph.toggle_deleted(parent, child, mark_deleted))
        })
    }

    /// Visible children of `parent` in attach order.
    pub fn list_children(
        &self,
        parent: NodeId,
        include_deleted: bool,
    ) -> GraphServiceResult<Vec<Edge>> {
        self.graph.read(|graph| {
            if !graph.contains_node(parent) {
                return Err(GraphServiceError::NodeNotFound(parent));
            }
            Ok(graph
                .children(parent, include_deleted)
                .into_iter()
                .cloned()
                .collect())
        })
    }

    /// Trail from `user`'s root to `node` over visible edges only.
    pub fn breadcrumb(&self, node: NodeId, user: UserId) -> NodePath {
        self.graph
            .breadcrumb_for_user(node, user, |_, edge| edge.is_deleted())
    }

    /// Shortest visible trail from `ancestor` to `node` that passes `via`.
    pub fn resolve_via(&self, node: NodeId, ancestor: NodeId, via: NodeId) -> NodePath {
        let visible: &dyn Fn(&Edge) -> bool = &|edge| edge.is_active();
        self.graph
            .shortest_path_to_ancestor_via(node, ancestor, via, Some(visible))
    }

    fn persist_new_node(
        &self,
        graph: &mut ContainmentGraph<LabUnit>,
        node_uuid: NodeId,
    ) -> GraphServiceResult<()> {
        let Some(node) = graph.node(node_uuid) else {
            return Err(GraphServiceError::NodeNotFound(node_uuid));
        };
        if let Err(err) = self.repo.insert_node(node) {
            graph.remove_node(node_uuid)?;
            return Err(err.into());
        }
        Ok(())
    }
}

fn normalize_name(value: String) -> GraphServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GraphServiceError::InvalidName);
    }
    Ok(trimmed.to_string())
}
