//! Node and edge types of the content graph

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed node in the content graph.
///
/// Nodes are identified by an opaque string id (UUID v4 unless the caller
/// supplies one). `metadata` is an arbitrary JSON object that round-trips
/// losslessly through storage; chunk text, source URLs and artifact stamps
/// all live there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Opaque unique identifier
    pub id: String,

    /// Open string tag; see [`crate::node_type`] for reserved values
    pub node_type: String,

    /// Human-readable display name
    pub title: String,

    /// Optional path to a content file, relative to the workspace root
    pub content_path: Option<String>,

    /// Arbitrary key/value pairs stored as a JSON object
    pub metadata: Map<String, Value>,

    /// Creation time (Unix seconds)
    pub created_at: i64,

    /// Last modification time (Unix seconds); always >= `created_at`
    pub updated_at: i64,
}

impl Node {
    /// Look up a string metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Look up an integer metadata field.
    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }
}

/// Input for creating a node.
///
/// Everything except `title` and `node_type` is optional; a fresh UUID is
/// assigned when `id` is not supplied.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub title: String,
    pub node_type: String,
    pub metadata: Map<String, Value>,
    pub content_path: Option<String>,
    pub id: Option<String>,
}

impl NewNode {
    pub fn new(title: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_content_path(mut self, path: impl Into<String>) -> Self {
        self.content_path = Some(path.into());
        self
    }
}

/// A partial update to a node.
///
/// Only the named fields can be changed; everything else on a node is
/// immutable after creation. An update with every field `None` is rejected
/// as a validation error, and unknown fields fail deserialization outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub node_type: Option<String>,
    pub content_path: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl NodeUpdate {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.node_type.is_none()
            && self.content_path.is_none()
            && self.metadata.is_none()
    }
}

/// A directed, labelled relation between two nodes.
///
/// The `(source_id, target_id, relation_type)` triple is unique;
/// re-inserting it is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    /// Open string tag; see [`crate::relation`] for reserved values
    pub relation_type: String,
    /// Creation time (Unix seconds)
    pub created_at: i64,
}

/// The whole graph: every node and every edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}
