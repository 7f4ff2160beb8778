//! Project helpers: creation, linking, reachability scoping, and export
//!
//! A project is a plain node of type `Project`. Membership is not a field:
//! a node belongs to a project when it is reachable from the project root
//! along outgoing edges within a hop budget.

use crate::GraphStore;
use lore_core::{node_type, Edge, LoreError, NewNode, Node, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Hop budget for project reachability, used for retrieval and chat alike.
pub const DEFAULT_SCOPE_DEPTH: u32 = 2;

/// Per-project statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub total_nodes: usize,
    pub by_type: HashMap<String, usize>,
    pub recent_artifacts: Vec<String>,
}

/// A serialisable project subgraph: the root, its reachable nodes, and
/// every edge whose endpoints are both inside the subgraph.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectExport {
    pub project: Node,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphStore {
    /// Create a new project node.
    pub fn create_project(&self, name: &str) -> Result<Node> {
        self.create_node(NewNode::new(name, node_type::PROJECT))
    }

    /// All project nodes, newest first.
    pub fn list_projects(&self) -> Result<Vec<Node>> {
        self.list_nodes(Some(node_type::PROJECT))
    }

    /// Connect a node to a project root.
    pub fn link_to_project(&self, project_id: &str, node_id: &str, relation: &str) -> Result<()> {
        self.connect_nodes(project_id, node_id, relation)
    }

    /// All nodes reachable from `project_id` along outgoing edges within
    /// `depth` hops, excluding the root itself.
    ///
    /// A bounded recursive CTE walks the edge table; re-visits on cyclic
    /// graphs are collapsed by the DISTINCT projection.
    pub fn get_project_nodes(&self, project_id: &str, depth: u32) -> Result<Vec<Node>> {
        let sql = format!(
            "WITH RECURSIVE reachable(id, depth) AS (
                 SELECT ?1, 0
                 UNION ALL
                 SELECT e.target_id, r.depth + 1
                 FROM edges e JOIN reachable r ON e.source_id = r.id
                 WHERE r.depth < ?2
             )
             SELECT DISTINCT n.{}
             FROM nodes n JOIN reachable r ON n.id = r.id
             WHERE n.id != ?1",
            Self::NODE_COLUMNS.replace(", ", ", n."),
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LoreError::Database(e.to_string()))?;
        let nodes = stmt
            .query_map(rusqlite::params![project_id, depth], Self::row_to_node)
            .map_err(|e| LoreError::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(nodes)
    }

    /// The ids of a project's reachable content nodes (root excluded).
    pub fn project_scope(&self, project_id: &str, depth: u32) -> Result<Vec<String>> {
        Ok(self
            .get_project_nodes(project_id, depth)?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    /// Count a project's nodes by type and list its recent artifact titles.
    pub fn project_summary(&self, project_id: &str) -> Result<ProjectSummary> {
        let nodes = self.get_project_nodes(project_id, DEFAULT_SCOPE_DEPTH)?;

        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut artifacts: Vec<String> = Vec::new();
        for node in &nodes {
            *by_type.entry(node.node_type.clone()).or_insert(0) += 1;
            if node.node_type == node_type::ARTIFACT {
                artifacts.push(node.title.clone());
            }
        }
        let recent_artifacts = artifacts
            .split_off(artifacts.len().saturating_sub(5));

        Ok(ProjectSummary {
            total_nodes: nodes.len(),
            by_type,
            recent_artifacts,
        })
    }

    /// Serialise the project subgraph: root, reachable nodes, and the edges
    /// internal to that node set (de-duplicated).
    pub fn export_project(&self, project_id: &str) -> Result<ProjectExport> {
        let project = self
            .get_node(project_id)?
            .ok_or_else(|| LoreError::NotFound(format!("project {}", project_id)))?;

        let nodes = self.get_project_nodes(project_id, DEFAULT_SCOPE_DEPTH)?;

        let mut node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        node_ids.insert(project.id.as_str());

        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut edges: Vec<Edge> = Vec::new();
        for id in node_ids.iter() {
            for edge in self.get_edges(*id)? {
                if !node_ids.contains(edge.source_id.as_str())
                    || !node_ids.contains(edge.target_id.as_str())
                {
                    continue;
                }
                let key = (
                    edge.source_id.clone(),
                    edge.target_id.clone(),
                    edge.relation_type.clone(),
                );
                if seen.insert(key) {
                    edges.push(edge);
                }
            }
        }

        Ok(ProjectExport { project, nodes, edges })
    }
}
