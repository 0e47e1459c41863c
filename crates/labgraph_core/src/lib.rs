//! Core containment graph for lab units.
//! This crate is the single source of truth for hierarchy invariants.

pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use graph::{
    AttachError, ContainmentGraph, Edge, EdgeKey, EdgeNotFound, GraphError, GraphNode, GraphView,
    MoveError, NodeId, NodeKind, NodePath, PathFinder, SharedGraph, UserId,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::unit::{LabUnit, UnitKind};
pub use repo::graph_repo::{
    GraphRepoError, GraphRepoResult, GraphRepository, SqliteGraphRepository,
};
pub use service::graph_service::{GraphService, GraphServiceError, GraphServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
