//! Core use-case services.
//!
//! # Responsibility
//! - Combine in-memory graph mutations with repository writes.
//! - Keep callers decoupled from storage details.

pub mod graph_service;
