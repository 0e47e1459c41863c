//! Repository layer for persisted containment graphs.
//!
//! # Responsibility
//! - Define the persistence contract the graph service depends on.
//! - Keep SQL details out of graph and service code.
//!
//! # Invariants
//! - Repository APIs report semantic errors (`NodeNotFound`,
//!   `EdgeNotFound`) in addition to DB transport errors.

pub mod graph_repo;
