//! Hierarchical containment graph.
//!
//! # Responsibility
//! - Model "is located inside" relations between lab units as a DAG
//!   whose nodes may have several parents.
//! - Provide cycle-safe mutations and upward/downward path queries.
//!
//! # Invariants
//! - No node is its own parent.
//! - Following parent edges from any node never revisits that node.
//! - At most one edge exists per `(parent, child)` pair, regardless of owner.
//! - Edge owner never changes after creation; only the soft-delete flag does.
//!
//! # See also
//! - [`containment::ContainmentGraph`] for mutations.
//! - [`path::PathFinder`] for queries.

pub mod containment;
pub mod edge;
pub mod node;
pub mod path;
pub mod shared;

pub use containment::{AttachError, ContainmentGraph, EdgeNotFound, GraphError, MoveError};
pub use edge::{Edge, EdgeKey};
pub use node::{GraphNode, NodeId, NodeKind, UserId};
pub use path::{NodePath, PathFinder};
pub use shared::{GraphView, SharedGraph};
