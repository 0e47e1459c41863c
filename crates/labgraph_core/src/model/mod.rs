//! Domain payloads carried by containment graph nodes.
//!
//! # Responsibility
//! - Define the lab-unit record stored alongside each graph node.
//! - Map unit kinds onto graph capabilities (container vs leaf).
//!
//! # Invariants
//! - Every unit is identified by the `NodeId` of the node that carries it;
//!   the payload itself holds no identity.

pub mod unit;
