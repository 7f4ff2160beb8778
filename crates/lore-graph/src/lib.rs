//! Lore Graph - Persistent knowledge graph with a hybrid search index
//!
//! Combines SQLite for typed nodes and edges with two shadow indexes kept
//! in lock-step with the node table: an FTS5 lexical index (synced by
//! triggers) and a vector table mirrored into an in-memory HNSW index.

mod conversations;
mod projects;
mod search;
mod vector;

pub use conversations::ChatTurn;
pub use projects::{ProjectExport, ProjectSummary, DEFAULT_SCOPE_DEPTH};
pub use search::DEFAULT_RRF_CONST;

use lore_core::{Edge, GraphPayload, LoreError, NewNode, Node, NodeUpdate, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use uuid::Uuid;
use vector::VectorIndex;

/// Current Unix time in seconds.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The graph store: nodes, edges, and both shadow indexes.
///
/// The connection sits behind a `Mutex` so the store can be shared across
/// async tasks with one writer and any number of (serialised) readers;
/// the HNSW index has its own lock so vector reads never wait on SQLite.
pub struct GraphStore {
    conn: Mutex<Connection>,
    vectors: RwLock<VectorIndex>,
    dim: usize,
}

impl GraphStore {
    /// Open or create a graph store at the given path.
    ///
    /// `dim` fixes the dimensionality of every vector in the store; it must
    /// match the embedder that feeds the ingestion pipeline.
    pub fn open(db_path: &str, dim: usize) -> Result<Self> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(db_path)
        }
        .map_err(|e| LoreError::Database(e.to_string()))?;

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| LoreError::Database(e.to_string()))?;
        if db_path != ":memory:" {
            // WAL lets readers proceed while the single writer commits.
            // journal_mode reports the resulting mode, so read it as a query.
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| LoreError::Database(e.to_string()))?;
        }

        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            vectors: RwLock::new(VectorIndex::new()),
            dim,
        };
        store.load_vector_index()?;

        info!("Opened graph store at {} (dim {})", db_path, dim);
        Ok(store)
    }

    /// Open an in-memory graph store (for testing).
    pub fn in_memory(dim: usize) -> Result<Self> {
        Self::open(":memory:", dim)
    }

    /// Vector dimensionality this store was opened with.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Initialize the database schema.
    ///
    /// Idempotent: every statement uses `IF NOT EXISTS`. The FTS triggers
    /// implement the lexical-shadow invariant: every node row has exactly
    /// one `nodes_fts` row, created empty and deleted with the node.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id           TEXT PRIMARY KEY,
                node_type    TEXT NOT NULL,
                title        TEXT NOT NULL,
                content_path TEXT,
                metadata     TEXT NOT NULL DEFAULT '{}',
                created_at   INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS edges (
                source_id     TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                target_id     TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                relation_type TEXT NOT NULL,
                created_at    INTEGER NOT NULL,
                UNIQUE (source_id, target_id, relation_type)
            );

            CREATE TABLE IF NOT EXISTS schema_version (
                version    INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            CREATE TABLE IF NOT EXISTS nodes_vec (
                id        TEXT PRIMARY KEY REFERENCES nodes(id) ON DELETE CASCADE,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_type    ON nodes(node_type);
            CREATE INDEX IF NOT EXISTS idx_edges_source  ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target  ON edges(target_id);

            CREATE VIRTUAL TABLE IF NOT EXISTS nodes_fts USING fts5(
                id UNINDEXED,
                content_body,
                tokenize = 'porter unicode61'
            );

            CREATE TRIGGER IF NOT EXISTS nodes_ai AFTER INSERT ON nodes BEGIN
                INSERT INTO nodes_fts(id, content_body) VALUES (new.id, '');
            END;
            CREATE TRIGGER IF NOT EXISTS nodes_ad AFTER DELETE ON nodes BEGIN
                DELETE FROM nodes_fts WHERE id = old.id;
            END;
            "#,
        )
        .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Highest applied migration version (0 when none).
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| LoreError::Database(e.to_string()))
    }

    /// Run any pending incremental migrations.
    ///
    /// Each migration is a `(version, sql)` pair applied in order and
    /// recorded in `schema_version`. The list is currently empty; future
    /// schema changes slot in here.
    pub fn migrate(&self) -> Result<()> {
        const MIGRATIONS: &[(i64, &str)] = &[];

        let applied = self.schema_version()?;
        let conn = self.conn.lock().unwrap();
        for (version, sql) in MIGRATIONS {
            if *version > applied {
                conn.execute_batch(sql)
                    .map_err(|e| LoreError::Database(e.to_string()))?;
                conn.execute(
                    "INSERT INTO schema_version(version, applied_at) VALUES (?1, ?2)",
                    params![version, now_secs()],
                )
                .map_err(|e| LoreError::Database(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
        let metadata_json: String = row.get(4)?;
        Ok(Node {
            id: row.get(0)?,
            node_type: row.get(1)?,
            title: row.get(2)?,
            content_path: row.get(3)?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub(crate) const NODE_COLUMNS: &'static str =
        "id, node_type, title, content_path, metadata, created_at, updated_at";

    // ========== Node operations ==========

    /// Insert a new node and return it.
    ///
    /// Assigns a fresh UUID when `new.id` is absent. The insert trigger
    /// creates the node's (empty) lexical-index row in the same statement's
    /// transaction, so a crash never leaves a node without its shadow row.
    pub fn create_node(&self, new: NewNode) -> Result<Node> {
        let id = new.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = now_secs();
        let metadata_json = serde_json::to_string(&new.metadata)
            .map_err(|e| LoreError::Parse(e.to_string()))?;

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO nodes (id, node_type, title, content_path, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, new.node_type, new.title, new.content_path, metadata_json, now, now],
            )
            .map_err(|e| LoreError::Database(e.to_string()))?;
        }

        self.get_node(&id)?
            .ok_or_else(|| LoreError::Database(format!("node {} vanished after insert", id)))
    }

    /// Fetch a single node by id. Returns `None` when absent.
    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM nodes WHERE id = ?1", Self::NODE_COLUMNS),
            params![id],
            Self::row_to_node,
        )
        .optional()
        .map_err(|e| LoreError::Database(e.to_string()))
    }

    /// Update one or more fields on a node.
    ///
    /// `updated_at` is always refreshed. An empty patch is a validation
    /// error; an unknown id is a not-found error.
    pub fn update_node(&self, id: &str, patch: NodeUpdate) -> Result<Node> {
        if patch.is_empty() {
            return Err(LoreError::Validation(
                "no fields provided to update_node".into(),
            ));
        }
        if self.get_node(id)?.is_none() {
            return Err(LoreError::NotFound(format!("node {}", id)));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(title) = patch.title {
            sets.push("title = ?");
            values.push(title.into());
        }
        if let Some(node_type) = patch.node_type {
            sets.push("node_type = ?");
            values.push(node_type.into());
        }
        if let Some(content_path) = patch.content_path {
            sets.push("content_path = ?");
            values.push(content_path.into());
        }
        if let Some(metadata) = patch.metadata {
            let json = serde_json::to_string(&metadata)
                .map_err(|e| LoreError::Parse(e.to_string()))?;
            sets.push("metadata = ?");
            values.push(json.into());
        }
        sets.push("updated_at = ?");
        values.push(now_secs().into());
        values.push(id.to_string().into());

        let sql = format!("UPDATE nodes SET {} WHERE id = ?", sets.join(", "));
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(&sql, rusqlite::params_from_iter(values))
                .map_err(|e| LoreError::Database(e.to_string()))?;
        }

        self.get_node(id)?
            .ok_or_else(|| LoreError::NotFound(format!("node {}", id)))
    }

    /// Delete a node, its incident edges (cascade), and both index rows.
    ///
    /// No-op when the id is unknown.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap();
            // nodes_vec and edges go via FK cascade, nodes_fts via trigger.
            conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])
                .map_err(|e| LoreError::Database(e.to_string()))?;
        }
        self.vectors.write().unwrap().remove(id);
        Ok(())
    }

    /// Return all nodes, newest first, optionally filtered by type.
    pub fn list_nodes(&self, node_type: Option<&str>) -> Result<Vec<Node>> {
        let conn = self.conn.lock().unwrap();
        let sql_all = format!(
            "SELECT {} FROM nodes ORDER BY created_at DESC, rowid DESC",
            Self::NODE_COLUMNS
        );
        let sql_typed = format!(
            "SELECT {} FROM nodes WHERE node_type = ?1 ORDER BY created_at DESC, rowid DESC",
            Self::NODE_COLUMNS
        );

        let mut stmt = conn
            .prepare(if node_type.is_some() { &sql_typed } else { &sql_all })
            .map_err(|e| LoreError::Database(e.to_string()))?;

        let rows = match node_type {
            Some(t) => stmt.query_map(params![t], Self::row_to_node),
            None => stmt.query_map([], Self::row_to_node),
        }
        .map_err(|e| LoreError::Database(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoreError::Database(e.to_string()))
    }

    // ========== Edge operations ==========

    /// Create a directed edge from `source_id` to `target_id`.
    ///
    /// Idempotent on the `(source, target, relation)` triple. Both
    /// endpoints must exist.
    pub fn connect_nodes(&self, source_id: &str, target_id: &str, relation_type: &str) -> Result<()> {
        if self.get_node(source_id)?.is_none() {
            return Err(LoreError::NotFound(format!("node {}", source_id)));
        }
        if self.get_node(target_id)?.is_none() {
            return Err(LoreError::NotFound(format!("node {}", target_id)));
        }

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO edges (source_id, target_id, relation_type, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![source_id, target_id, relation_type, now_secs()],
        )
        .map_err(|e| LoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Return every edge where the node is the source or the target.
    pub fn get_edges(&self, node_id: &str) -> Result<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT source_id, target_id, relation_type, created_at
                 FROM edges WHERE source_id = ?1 OR target_id = ?1",
            )
            .map_err(|e| LoreError::Database(e.to_string()))?;

        let edges = stmt
            .query_map(params![node_id], |row| {
                Ok(Edge {
                    source_id: row.get(0)?,
                    target_id: row.get(1)?,
                    relation_type: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| LoreError::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(edges)
    }

    /// Return all nodes and edges, for graph export/visualisation.
    pub fn get_graph(&self) -> Result<GraphPayload> {
        let nodes = self.list_nodes(None)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT source_id, target_id, relation_type, created_at FROM edges")
            .map_err(|e| LoreError::Database(e.to_string()))?;
        let edges = stmt
            .query_map([], |row| {
                Ok(Edge {
                    source_id: row.get(0)?,
                    target_id: row.get(1)?,
                    relation_type: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| LoreError::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(GraphPayload { nodes, edges })
    }

    // ========== Index shadow writes ==========

    /// Write the lexical-index body for a node.
    ///
    /// The insert trigger created the row empty; the owning writer (the
    /// ingestion pipeline) fills it with the source or chunk text.
    pub fn set_content_body(&self, node_id: &str, body: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE nodes_fts SET content_body = ?1 WHERE id = ?2",
                params![body, node_id],
            )
            .map_err(|e| LoreError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(LoreError::NotFound(format!("lexical row for node {}", node_id)));
        }
        Ok(())
    }

    /// Read back a node's lexical-index body (diagnostic helper).
    pub fn content_body(&self, node_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT content_body FROM nodes_fts WHERE id = ?1",
            params![node_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LoreError::Database(e.to_string()))
    }

    /// Insert or replace a node's embedding in the vector index.
    ///
    /// Idempotent on `node_id`. The vector must match the store dimension.
    pub fn upsert_embedding(&self, node_id: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(LoreError::Validation(format!(
                "embedding dimension {} does not match store dimension {}",
                vector.len(),
                self.dim
            )));
        }
        if self.get_node(node_id)?.is_none() {
            return Err(LoreError::NotFound(format!("node {}", node_id)));
        }

        let blob: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO nodes_vec (id, embedding) VALUES (?1, ?2)",
                params![node_id, blob],
            )
            .map_err(|e| LoreError::Database(e.to_string()))?;
        }

        self.vectors
            .write()
            .unwrap()
            .insert(node_id, vector.to_vec());
        Ok(())
    }

    /// Read back a node's stored embedding, if any.
    pub fn embedding_for(&self, node_id: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock().unwrap();
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM nodes_vec WHERE id = ?1",
                params![node_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(blob.map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        }))
    }

    /// Rebuild the in-memory HNSW index from the persisted vector table.
    fn load_vector_index(&self) -> Result<()> {
        let rows: Vec<(String, Vec<u8>)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT id, embedding FROM nodes_vec")
                .map_err(|e| LoreError::Database(e.to_string()))?;
            let result = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(|e| LoreError::Database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| LoreError::Database(e.to_string()))?;
            result
        };

        let mut index = self.vectors.write().unwrap();
        for (id, blob) in rows {
            let vector: Vec<f32> = blob
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            index.insert(&id, vector);
        }
        if index.len() > 0 {
            info!("Loaded {} vectors into the ANN index", index.len());
        }
        Ok(())
    }

    pub(crate) fn vector_hits(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        self.vectors.read().unwrap().search(query, k)
    }

    // ========== Diagnostics ==========

    /// Row counts across the store.
    pub fn stats(&self) -> Result<GraphStats> {
        let conn = self.conn.lock().unwrap();
        let count = |sql: &str| -> Result<i64> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(|e| LoreError::Database(e.to_string()))
        };

        Ok(GraphStats {
            nodes: count("SELECT COUNT(*) FROM nodes")? as usize,
            edges: count("SELECT COUNT(*) FROM edges")? as usize,
            vectors: count("SELECT COUNT(*) FROM nodes_vec")? as usize,
        })
    }
}

/// Row counts across the store
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub vectors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::{node_type, relation};
    use serde_json::json;

    fn store() -> GraphStore {
        GraphStore::in_memory(4).unwrap()
    }

    fn source(title: &str) -> NewNode {
        NewNode::new(title, node_type::SOURCE)
    }

    #[test]
    fn test_node_roundtrip() {
        let store = store();
        let mut metadata = serde_json::Map::new();
        metadata.insert("url".into(), json!("https://example.com"));

        let node = store
            .create_node(source("Example").with_metadata(metadata))
            .unwrap();
        assert!(!node.id.is_empty());
        assert_eq!(node.updated_at, node.created_at);

        let fetched = store.get_node(&node.id).unwrap().unwrap();
        assert_eq!(fetched, node);
        assert_eq!(fetched.meta_str("url"), Some("https://example.com"));
    }

    #[test]
    fn test_create_node_with_explicit_id() {
        let store = store();
        let node = store
            .create_node(source("Pinned").with_id("pinned-id"))
            .unwrap();
        assert_eq!(node.id, "pinned-id");
    }

    #[test]
    fn test_lexical_row_created_with_node() {
        let store = store();
        let node = store.create_node(source("S")).unwrap();
        assert_eq!(store.content_body(&node.id).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_update_node() {
        let store = store();
        let node = store.create_node(source("Old title")).unwrap();

        let updated = store
            .update_node(
                &node.id,
                NodeUpdate {
                    title: Some("New title".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert!(updated.updated_at >= node.updated_at);
    }

    #[test]
    fn test_update_empty_patch_is_validation_error() {
        let store = store();
        let node = store.create_node(source("S")).unwrap();
        let err = store.update_node(&node.id, NodeUpdate::default()).unwrap_err();
        assert!(matches!(err, LoreError::Validation(_)));
    }

    #[test]
    fn test_update_unknown_node_is_not_found() {
        let store = store();
        let err = store
            .update_node(
                "missing",
                NodeUpdate {
                    title: Some("x".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = store();
        store.delete_node("never-existed").unwrap();

        let node = store.create_node(source("S")).unwrap();
        store.delete_node(&node.id).unwrap();
        store.delete_node(&node.id).unwrap();
        assert!(store.get_node(&node.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_cascades_edges() {
        let store = store();
        let a = store.create_node(source("A")).unwrap();
        let b = store.create_node(source("B")).unwrap();
        store
            .connect_nodes(&a.id, &b.id, relation::RELATED_TO)
            .unwrap();

        store.delete_node(&a.id).unwrap();
        assert!(store.get_edges(&b.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_index_rows() {
        let store = store();
        let node = store.create_node(source("S")).unwrap();
        store.upsert_embedding(&node.id, &[0.1, 0.2, 0.3, 0.4]).unwrap();

        store.delete_node(&node.id).unwrap();
        assert!(store.content_body(&node.id).unwrap().is_none());
        assert!(store.embedding_for(&node.id).unwrap().is_none());
        assert!(store.vector_hits(&[0.1, 0.2, 0.3, 0.4], 5).is_empty());
    }

    #[test]
    fn test_connect_nodes_idempotent() {
        let store = store();
        let a = store.create_node(source("A")).unwrap();
        let b = store.create_node(source("B")).unwrap();

        store.connect_nodes(&a.id, &b.id, "related").unwrap();
        store.connect_nodes(&a.id, &b.id, "related").unwrap();

        assert_eq!(store.get_edges(&a.id).unwrap().len(), 1);
    }

    #[test]
    fn test_connect_nodes_requires_endpoints() {
        let store = store();
        let a = store.create_node(source("A")).unwrap();
        let err = store.connect_nodes(&a.id, "ghost", "related").unwrap_err();
        assert!(matches!(err, LoreError::NotFound(_)));
    }

    #[test]
    fn test_get_edges_covers_both_directions() {
        let store = store();
        let a = store.create_node(source("A")).unwrap();
        let b = store.create_node(source("B")).unwrap();
        store.connect_nodes(&a.id, &b.id, "cites").unwrap();

        assert_eq!(store.get_edges(&a.id).unwrap().len(), 1);
        assert_eq!(store.get_edges(&b.id).unwrap().len(), 1);
    }

    #[test]
    fn test_list_nodes_filters_by_type() {
        let store = store();
        store.create_node(source("S1")).unwrap();
        store.create_node(source("S2")).unwrap();
        store
            .create_node(NewNode::new("P", node_type::PROJECT))
            .unwrap();

        assert_eq!(store.list_nodes(Some(node_type::SOURCE)).unwrap().len(), 2);
        assert_eq!(store.list_nodes(Some(node_type::PROJECT)).unwrap().len(), 1);
        assert_eq!(store.list_nodes(None).unwrap().len(), 3);
    }

    #[test]
    fn test_embedding_dimension_enforced() {
        let store = store();
        let node = store.create_node(source("S")).unwrap();
        let err = store.upsert_embedding(&node.id, &[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, LoreError::Validation(_)));
    }

    #[test]
    fn test_embedding_upsert_replaces() {
        let store = store();
        let node = store.create_node(source("S")).unwrap();
        store.upsert_embedding(&node.id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.upsert_embedding(&node.id, &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let stored = store.embedding_for(&node.id).unwrap().unwrap();
        assert_eq!(stored, vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(store.stats().unwrap().vectors, 1);
    }

    #[test]
    fn test_vector_index_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("library.db");
        let path = path.to_str().unwrap();

        let id = {
            let store = GraphStore::open(path, 4).unwrap();
            let node = store.create_node(source("S")).unwrap();
            store.upsert_embedding(&node.id, &[0.9, 0.1, 0.0, 0.0]).unwrap();
            node.id
        };

        let store = GraphStore::open(path, 4).unwrap();
        let hits = store.vector_hits(&[0.9, 0.1, 0.0, 0.0], 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, id);
    }

    #[test]
    fn test_schema_version_starts_at_zero() {
        let store = store();
        assert_eq!(store.schema_version().unwrap(), 0);
        store.migrate().unwrap();
        assert_eq!(store.schema_version().unwrap(), 0);
    }

    #[test]
    fn test_get_graph_returns_everything() {
        let store = store();
        let a = store.create_node(source("A")).unwrap();
        let b = store.create_node(source("B")).unwrap();
        store.connect_nodes(&a.id, &b.id, "related").unwrap();

        let graph = store.get_graph().unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }
}
