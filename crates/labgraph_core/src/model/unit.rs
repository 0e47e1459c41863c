//! Lab unit payload model.
//!
//! # Responsibility
//! - Describe the organizational unit a graph node represents.
//! - Decide which unit kinds may hold children.
//!
//! # Invariants
//! - `Document` is the only leaf kind; every other kind is a container.
//! - Kind names are persisted as stable `snake_case` strings.

use crate::graph::NodeKind;
use serde::{Deserialize, Serialize};

/// Organizational unit category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Top of one user's personal hierarchy.
    UserRoot,
    /// Plain folder.
    Folder,
    /// Folder shared into a group or with other users.
    SharedFolder,
    /// Notebook holding entries.
    Notebook,
    /// Single document; never holds children.
    Document,
}

impl UnitKind {
    /// Stable storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserRoot => "user_root",
            Self::Folder => "folder",
            Self::SharedFolder => "shared_folder",
            Self::Notebook => "notebook",
            Self::Document => "document",
        }
    }

    /// Parses a storage name produced by [`UnitKind::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user_root" => Some(Self::UserRoot),
            "folder" => Some(Self::Folder),
            "shared_folder" => Some(Self::SharedFolder),
            "notebook" => Some(Self::Notebook),
            "document" => Some(Self::Document),
            _ => None,
        }
    }

    /// Graph capability for this kind.
    pub fn node_kind(self) -> NodeKind {
        match self {
            Self::Document => NodeKind::Leaf,
            _ => NodeKind::Container,
        }
    }
}

/// Payload stored on each node of the lab containment graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabUnit {
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: UnitKind,
    /// User-facing label. Not unique and not part of node identity.
    pub name: String,
}

impl LabUnit {
    /// Creates a unit payload.
    pub fn new(kind: UnitKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}
