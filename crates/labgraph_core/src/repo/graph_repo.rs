//! Containment graph repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load the persisted working set into a `ContainmentGraph`.
//! - Record successful in-memory mutations durably.
//!
//! # Invariants
//! - Nodes and edges load in insertion order, so incidence order survives
//!   a round trip.
//! - Edge writes re-check acyclicity against stored rows inside the same
//!   immediate transaction that inserts the edge.
//! - Stored rows that break a graph invariant surface as `InvalidData`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::graph::{ContainmentGraph, Edge, EdgeKey, GraphNode, NodeId, UserId};
use crate::model::unit::{LabUnit, UnitKind};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by graph repository operations.
pub type GraphRepoResult<T> = Result<T, GraphRepoError>;

/// Errors from graph repository operations.
#[derive(Debug)]
pub enum GraphRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target node row does not exist.
    NodeNotFound(NodeId),
    /// Target edge row does not exist.
    EdgeNotFound(EdgeKey),
    /// Stored edges already make the child an ancestor of the parent.
    CycleDetected(EdgeKey),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted into a valid graph.
    InvalidData(String),
}

impl Display for GraphRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "graph node row not found: {id}"),
            Self::EdgeNotFound(key) => write!(f, "graph edge row not found: {key}"),
            Self::CycleDetected(key) => {
                write!(f, "stored graph already links {key} in reverse")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "graph repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid graph data: {message}"),
        }
    }
}

impl Error for GraphRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GraphRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GraphRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator for the lab containment graph.
pub trait GraphRepository {
    /// Loads every node and edge into a fresh working set.
    fn load_graph(&self) -> GraphRepoResult<ContainmentGraph<LabUnit>>;
    /// Stores one new node, including its root marker.
    fn insert_node(&self, node: &GraphNode<LabUnit>) -> GraphRepoResult<()>;
    /// Deletes one node row. Fails while edge rows reference it.
    fn delete_node(&self, node_uuid: NodeId) -> GraphRepoResult<()>;
    /// Sets or clears the root-for-user marker.
    fn set_root_owner(&self, node_uuid: NodeId, owner: Option<UserId>) -> GraphRepoResult<()>;
    /// Stores one new edge.
    fn insert_edge(&self, edge: &Edge) -> GraphRepoResult<()>;
    /// Deletes one edge row; returns whether a row existed.
    fn delete_edge(&self, key: EdgeKey) -> GraphRepoResult<bool>;
    /// Updates the soft-delete flag of one edge.
    fn set_edge_deleted(&self, key: EdgeKey, deleted: bool) -> GraphRepoResult<()>;
    /// Removes `removed` (when given) and stores `added` in one transaction.
    fn move_edge(&self, removed: Option<EdgeKey>, added: &Edge) -> GraphRepoResult<()>;
}

/// SQLite-backed graph repository.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> GraphRepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn load_graph(&self) -> GraphRepoResult<ContainmentGraph<LabUnit>> {
        let mut graph = ContainmentGraph::new();

        let mut stmt = self.conn.prepare(
            "SELECT node_uuid, kind, name, root_owner
             FROM graph_nodes
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let (node_uuid, unit, root_owner) = parse_node_row(row)?;
            graph
                .insert_node(node_uuid, unit.kind.node_kind(), unit)
                .map_err(|err| GraphRepoError::InvalidData(err.to_string()))?;
            if root_owner.is_some() {
                graph
                    .mark_root(node_uuid, root_owner)
                    .map_err(|err| GraphRepoError::InvalidData(err.to_string()))?;
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT parent_uuid, child_uuid, owner_uuid, is_deleted
             FROM graph_edges
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let parent = parse_uuid(&row.get::<_, String>(0)?, "graph_edges.parent_uuid")?;
            let child = parse_uuid(&row.get::<_, String>(1)?, "graph_edges.child_uuid")?;
            let owner = parse_uuid(&row.get::<_, String>(2)?, "graph_edges.owner_uuid")?;
            let deleted = parse_flag(row.get(3)?, "graph_edges.is_deleted")?;
            graph
                .restore_edge(parent, child, owner, deleted)
                .map_err(|err| GraphRepoError::InvalidData(err.to_string()))?;
        }

        info!(
            "event=graph_load module=repo status=ok nodes={} edges={}",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    fn insert_node(&self, node: &GraphNode<LabUnit>) -> GraphRepoResult<()> {
        self.conn.execute(
            "INSERT INTO graph_nodes (node_uuid, kind, name, root_owner)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                node.id().to_string(),
                node.payload().kind.as_str(),
                node.payload().name,
                node.root_owner().map(|value| value.to_string()),
            ],
        )?;
        Ok(())
    }

    fn delete_node(&self, node_uuid: NodeId) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM graph_nodes WHERE node_uuid = ?1;",
            [node_uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::NodeNotFound(node_uuid));
        }
        Ok(())
    }

    fn set_root_owner(&self, node_uuid: NodeId, owner: Option<UserId>) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE graph_nodes SET root_owner = ?2 WHERE node_uuid = ?1;",
            params![node_uuid.to_string(), owner.map(|value| value.to_string())],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::NodeNotFound(node_uuid));
        }
        Ok(())
    }

    fn insert_edge(&self, edge: &Edge) -> GraphRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_edge_checked(&tx, edge)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_edge(&self, key: EdgeKey) -> GraphRepoResult<bool> {
        let changed = delete_edge_row(self.conn, key)?;
        Ok(changed > 0)
    }

    fn set_edge_deleted(&self, key: EdgeKey, deleted: bool) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE graph_edges
             SET is_deleted = ?3
             WHERE parent_uuid = ?1
               AND child_uuid = ?2;",
            params![key.parent.to_string(), key.child.to_string(), i64::from(deleted)],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::EdgeNotFound(key));
        }
        Ok(())
    }

    fn move_edge(&self, removed: Option<EdgeKey>, added: &Edge) -> GraphRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(key) = removed {
            if delete_edge_row(&tx, key)? == 0 {
                return Err(GraphRepoError::EdgeNotFound(key));
            }
        }
        insert_edge_checked(&tx, added)?;
        tx.commit()?;
        Ok(())
    }
}

fn insert_edge_checked(conn: &Connection, edge: &Edge) -> GraphRepoResult<()> {
    let key = edge.key();
    let closes_cycle: i64 = conn.query_row(
        "WITH RECURSIVE ancestors(node_uuid) AS (
            SELECT parent_uuid
            FROM graph_edges
            WHERE child_uuid = ?1
            UNION
            SELECT e.parent_uuid
            FROM graph_edges e
            INNER JOIN ancestors a ON e.child_uuid = a.node_uuid
        )
        SELECT EXISTS(SELECT 1 FROM ancestors WHERE node_uuid = ?2);",
        params![key.parent.to_string(), key.child.to_string()],
        |row| row.get(0),
    )?;
    if closes_cycle == 1 {
        return Err(GraphRepoError::CycleDetected(key));
    }

    conn.execute(
        "INSERT INTO graph_edges (parent_uuid, child_uuid, owner_uuid, is_deleted)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            key.parent.to_string(),
            key.child.to_string(),
            edge.owner().to_string(),
            i64::from(edge.is_deleted()),
        ],
    )?;
    Ok(())
}

fn delete_edge_row(conn: &Connection, key: EdgeKey) -> GraphRepoResult<usize> {
    let changed = conn.execute(
        "DELETE FROM graph_edges
         WHERE parent_uuid = ?1
           AND child_uuid = ?2;",
        params![key.parent.to_string(), key.child.to_string()],
    )?;
    Ok(changed)
}

fn parse_node_row(row: &Row<'_>) -> GraphRepoResult<(NodeId, LabUnit, Option<UserId>)> {
    let node_uuid = parse_uuid(&row.get::<_, String>("node_uuid")?, "graph_nodes.node_uuid")?;
    let kind_text: String = row.get("kind")?;
    let kind = UnitKind::parse(&kind_text).ok_or_else(|| {
        GraphRepoError::InvalidData(format!(
            "invalid unit kind `{kind_text}` in graph_nodes.kind"
        ))
    })?;
    let root_owner = row
        .get::<_, Option<String>>("root_owner")?
        .map(|value| parse_uuid(&value, "graph_nodes.root_owner"))
        .transpose()?;
    Ok((node_uuid, LabUnit::new(kind, row.get::<_, String>("name")?), root_owner))
}

fn parse_flag(value: i64, column: &'static str) -> GraphRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(GraphRepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn parse_uuid(value: &str, column: &'static str) -> GraphRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| GraphRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_graph_connection_ready(conn: &Connection) -> GraphRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(GraphRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["graph_nodes", "graph_edges"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(GraphRepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
