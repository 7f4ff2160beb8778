//! Conversation persistence on top of Chat nodes
//!
//! A conversation is a node of type `Chat` whose transcript lives in
//! `metadata["messages"]` as an ordered array of `{role, content, ts}`
//! objects. A `CONVERSATION_IN` edge points from the Chat node to its
//! Project node.

use crate::{now_secs, GraphStore};
use lore_core::{node_type, relation, LoreError, NewNode, Node, NodeUpdate, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    /// Unix timestamp (seconds)
    pub ts: i64,
}

impl ChatTurn {
    pub fn now(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            ts: now_secs(),
        }
    }
}

impl GraphStore {
    /// Create a Chat node bound to `project_id`.
    pub fn create_conversation(&self, project_id: &str, title: &str) -> Result<Node> {
        if self.get_node(project_id)?.is_none() {
            return Err(LoreError::NotFound(format!("project {}", project_id)));
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("messages".into(), json!([]));

        let node = self.create_node(
            NewNode::new(title, node_type::CHAT).with_metadata(metadata),
        )?;
        self.connect_nodes(&node.id, project_id, relation::CONVERSATION_IN)?;
        Ok(node)
    }

    /// Fetch a Chat node by id; `None` when absent or not a Chat node.
    pub fn get_conversation(&self, conv_id: &str) -> Result<Option<Node>> {
        Ok(self
            .get_node(conv_id)?
            .filter(|n| n.node_type == node_type::CHAT))
    }

    /// All conversations of a project, most recently active first.
    pub fn list_conversations(&self, project_id: &str) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT n.{}
             FROM nodes n JOIN edges e ON e.source_id = n.id
             WHERE n.node_type = ?1
               AND e.relation_type = ?2
               AND e.target_id = ?3
             ORDER BY n.updated_at DESC",
            Self::NODE_COLUMNS.replace(", ", ", n."),
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LoreError::Database(e.to_string()))?;
        let nodes = stmt
            .query_map(
                rusqlite::params![node_type::CHAT, relation::CONVERSATION_IN, project_id],
                Self::row_to_node,
            )
            .map_err(|e| LoreError::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(nodes)
    }

    /// Append turns to `metadata["messages"]` and refresh `updated_at`.
    pub fn append_messages(&self, conv_id: &str, turns: &[ChatTurn]) -> Result<Node> {
        let node = self
            .get_conversation(conv_id)?
            .ok_or_else(|| LoreError::NotFound(format!("conversation {}", conv_id)))?;

        let mut metadata = node.metadata.clone();
        let mut messages: Vec<Value> = metadata
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for turn in turns {
            messages.push(serde_json::to_value(turn).map_err(|e| LoreError::Parse(e.to_string()))?);
        }
        metadata.insert("messages".into(), Value::Array(messages));

        self.update_node(
            conv_id,
            NodeUpdate {
                metadata: Some(metadata),
                ..Default::default()
            },
        )
    }

    /// Read a conversation's transcript.
    pub fn conversation_messages(&self, conv_id: &str) -> Result<Vec<ChatTurn>> {
        let node = self
            .get_conversation(conv_id)?
            .ok_or_else(|| LoreError::NotFound(format!("conversation {}", conv_id)))?;

        let turns = node
            .metadata
            .get("messages")
            .and_then(Value::as_array)
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| serde_json::from_value(m.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(turns)
    }

    /// Delete a conversation node (edges cascade). No-op when absent.
    pub fn delete_conversation(&self, conv_id: &str) -> Result<()> {
        self.delete_node(conv_id)
    }
}
