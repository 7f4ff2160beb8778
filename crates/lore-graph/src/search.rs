//! Keyword, vector, and hybrid search over the knowledge graph
//!
//! Three read-only entry points, each optionally scoped to a set of node
//! ids (project scoping is resolved by the caller):
//!
//! - [`GraphStore::fts_search`] — FTS5 keyword match, BM25-ranked.
//! - [`GraphStore::vector_search`] — k-nearest neighbours, distance ascending.
//! - [`GraphStore::hybrid_search`] — the two merged by Reciprocal Rank Fusion.

use crate::GraphStore;
use lore_core::{LoreError, Node, Result};
use rusqlite::types::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// RRF smoothing constant used by [`GraphStore::hybrid_search`].
pub const DEFAULT_RRF_CONST: f32 = 60.0;

/// Convert free-form user text into a safe FTS5 match expression.
///
/// FTS5 treats commas, apostrophes, hyphens, colons and quotes as query
/// operators, so a raw sentence is a syntax error. We extract alphanumeric
/// tokens of length >= 3, de-duplicate case-insensitively preserving order,
/// quote each one (a quoted string is a phrase literal), and join with
/// spaces (implicit AND). Returns `None` when no token survives; callers
/// degrade to a match-everything listing instead of erroring.
pub(crate) fn sanitize_match_expr(text: &str) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current = String::new();

    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_alphanumeric() {
            current.push(ch);
        } else if !current.is_empty() {
            if current.len() >= 3 && seen.insert(current.to_lowercase()) {
                tokens.push(current.clone());
            }
            current.clear();
        }
    }

    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

impl GraphStore {
    /// Top-k nodes whose indexed text matches `query`, best first.
    ///
    /// When `scope` is given, results are restricted to those ids. A query
    /// with no usable tokens matches everything: the most recently created
    /// indexed nodes are returned instead.
    pub fn fts_search(&self, query: &str, k: usize, scope: Option<&[String]>) -> Result<Vec<Node>> {
        debug!("fts_search: {:?} (k={})", query, k);

        let mut values: Vec<Value> = Vec::new();
        let scope_clause = match scope {
            Some(ids) if !ids.is_empty() => {
                let placeholders = vec!["?"; ids.len()].join(",");
                format!("AND n.id IN ({})", placeholders)
            }
            Some(_) => return Ok(Vec::new()),
            None => String::new(),
        };

        let sql = match sanitize_match_expr(query) {
            Some(expr) => {
                values.push(expr.into());
                if let Some(ids) = scope {
                    values.extend(ids.iter().map(|id| Value::from(id.clone())));
                }
                values.push((k as i64).into());
                format!(
                    "SELECT n.{} FROM nodes n JOIN nodes_fts ON n.id = nodes_fts.id
                     WHERE nodes_fts MATCH ? {}
                     ORDER BY bm25(nodes_fts)
                     LIMIT ?",
                    Self::NODE_COLUMNS.replace(", ", ", n."),
                    scope_clause,
                )
            }
            None => {
                // Match-everything degradation for token-free queries.
                if let Some(ids) = scope {
                    values.extend(ids.iter().map(|id| Value::from(id.clone())));
                }
                values.push((k as i64).into());
                format!(
                    "SELECT n.{} FROM nodes n JOIN nodes_fts ON n.id = nodes_fts.id
                     WHERE 1 = 1 {}
                     ORDER BY n.created_at DESC, n.rowid DESC
                     LIMIT ?",
                    Self::NODE_COLUMNS.replace(", ", ", n."),
                    scope_clause,
                )
            }
        };

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LoreError::Database(e.to_string()))?;
        let nodes = stmt
            .query_map(rusqlite::params_from_iter(values), Self::row_to_node)
            .map_err(|e| LoreError::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LoreError::Database(e.to_string()))?;

        Ok(nodes)
    }

    /// The k nodes nearest to `embedding`, distance ascending.
    ///
    /// The ANN index is over-fetched (x4, floor k + 16) before stale-slot
    /// and scope filtering so the post-filter set still fills k.
    pub fn vector_search(
        &self,
        embedding: &[f32],
        k: usize,
        scope: Option<&[String]>,
    ) -> Result<Vec<Node>> {
        if embedding.len() != self.dim() {
            return Err(LoreError::Validation(format!(
                "query embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dim()
            )));
        }

        let scope_set: Option<HashSet<&str>> =
            scope.map(|ids| ids.iter().map(String::as_str).collect());
        if matches!(scope_set, Some(ref s) if s.is_empty()) {
            return Ok(Vec::new());
        }

        let overfetch = (k * 4).max(k + 16);
        let hits = self.vector_hits(embedding, overfetch);

        let mut nodes = Vec::with_capacity(k);
        for (id, _distance) in hits {
            if let Some(ref set) = scope_set {
                if !set.contains(id.as_str()) {
                    continue;
                }
            }
            if let Some(node) = self.get_node(&id)? {
                nodes.push(node);
            }
            if nodes.len() == k {
                break;
            }
        }
        Ok(nodes)
    }

    /// Merge FTS and vector results with Reciprocal Rank Fusion.
    ///
    /// Both legs are fetched at `2k`, each node scores
    /// `sum(1 / (rrf_const + rank))` over the lists it appears in (1-based
    /// ranks), and ties break by lexical rank, then first-seen order.
    pub fn hybrid_search(
        &self,
        query: &str,
        embedding: &[f32],
        k: usize,
        scope: Option<&[String]>,
    ) -> Result<Vec<Node>> {
        self.hybrid_search_rrf(query, embedding, k, DEFAULT_RRF_CONST, scope)
    }

    /// [`GraphStore::hybrid_search`] with an explicit RRF constant.
    pub fn hybrid_search_rrf(
        &self,
        query: &str,
        embedding: &[f32],
        k: usize,
        rrf_const: f32,
        scope: Option<&[String]>,
    ) -> Result<Vec<Node>> {
        let fts_results = self.fts_search(query, k * 2, scope)?;
        let vec_results = self.vector_search(embedding, k * 2, scope)?;

        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut fts_rank: HashMap<String, usize> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();
        let mut nodes: HashMap<String, Node> = HashMap::new();

        for (rank, node) in fts_results.into_iter().enumerate() {
            *scores.entry(node.id.clone()).or_insert(0.0) += 1.0 / (rrf_const + (rank + 1) as f32);
            fts_rank.insert(node.id.clone(), rank + 1);
            if !nodes.contains_key(&node.id) {
                first_seen.push(node.id.clone());
                nodes.insert(node.id.clone(), node);
            }
        }
        for (rank, node) in vec_results.into_iter().enumerate() {
            *scores.entry(node.id.clone()).or_insert(0.0) += 1.0 / (rrf_const + (rank + 1) as f32);
            if !nodes.contains_key(&node.id) {
                first_seen.push(node.id.clone());
                nodes.insert(node.id.clone(), node);
            }
        }

        let order_index: HashMap<&str, usize> = first_seen
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut ranked: Vec<(String, f32)> = scores.into_iter().collect();
        ranked.sort_by(|(a_id, a_score), (b_id, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_rank = fts_rank.get(a_id).copied().unwrap_or(usize::MAX);
                    let b_rank = fts_rank.get(b_id).copied().unwrap_or(usize::MAX);
                    a_rank.cmp(&b_rank)
                })
                .then_with(|| order_index[a_id.as_str()].cmp(&order_index[b_id.as_str()]))
        });

        Ok(ranked
            .into_iter()
            .take(k)
            .filter_map(|(id, _)| nodes.remove(&id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::{node_type, NewNode};

    fn store() -> GraphStore {
        GraphStore::in_memory(4).unwrap()
    }

    fn indexed_source(store: &GraphStore, title: &str, body: &str) -> Node {
        let node = store
            .create_node(NewNode::new(title, node_type::SOURCE))
            .unwrap();
        store.set_content_body(&node.id, body).unwrap();
        node
    }

    #[test]
    fn test_sanitize_quotes_and_dedupes() {
        let expr = sanitize_match_expr("Battery, battery-technology: a 'review'!").unwrap();
        assert_eq!(expr, "\"Battery\" \"technology\" \"review\"");
    }

    #[test]
    fn test_sanitize_drops_short_tokens() {
        assert_eq!(sanitize_match_expr("an of to"), None);
        assert_eq!(sanitize_match_expr("?!,"), None);
        assert_eq!(sanitize_match_expr(""), None);
    }

    #[test]
    fn test_empty_store_returns_empty_everywhere() {
        let store = store();
        assert!(store.fts_search("anything", 10, None).unwrap().is_empty());
        assert!(store
            .vector_search(&[0.1, 0.2, 0.3, 0.4], 10, None)
            .unwrap()
            .is_empty());
        assert!(store
            .hybrid_search("anything", &[0.1, 0.2, 0.3, 0.4], 10, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_fts_finds_unique_token() {
        let store = store();
        let target = indexed_source(&store, "Botany", "the zygomorphic flower structure");
        indexed_source(&store, "Other", "nothing relevant here");

        let results = store.fts_search("zygomorphic", 10, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, target.id);
    }

    #[test]
    fn test_fts_porter_stemming() {
        let store = store();
        let target = indexed_source(&store, "Energy", "battery technology advances");

        let results = store.fts_search("batteries", 10, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, target.id);
    }

    #[test]
    fn test_fts_scope_filters() {
        let store = store();
        let a = indexed_source(&store, "A", "shared keyword electrolyte");
        indexed_source(&store, "B", "shared keyword electrolyte");

        let scoped = store
            .fts_search("electrolyte", 10, Some(&[a.id.clone()]))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, a.id);

        let empty_scope: Vec<String> = Vec::new();
        assert!(store
            .fts_search("electrolyte", 10, Some(&empty_scope))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_token_free_query_degrades_to_listing() {
        let store = store();
        indexed_source(&store, "A", "alpha text");
        indexed_source(&store, "B", "beta text");

        let results = store.fts_search("?!", 10, None).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_vector_search_orders_by_distance() {
        let store = store();
        let near = indexed_source(&store, "near", "n");
        let far = indexed_source(&store, "far", "f");
        store.upsert_embedding(&near.id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.upsert_embedding(&far.id, &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let results = store
            .vector_search(&[0.9, 0.1, 0.0, 0.0], 2, None)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, near.id);
        assert_eq!(results[1].id, far.id);
    }

    #[test]
    fn test_vector_search_scope_post_filter() {
        let store = store();
        let a = indexed_source(&store, "A", "");
        let b = indexed_source(&store, "B", "");
        store.upsert_embedding(&a.id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.upsert_embedding(&b.id, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = store
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 1, Some(&[b.id.clone()]))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, b.id);
    }

    #[test]
    fn test_vector_search_rejects_wrong_dimension() {
        let store = store();
        let err = store.vector_search(&[0.1, 0.2], 5, None).unwrap_err();
        assert!(matches!(err, LoreError::Validation(_)));
    }

    #[test]
    fn test_hybrid_returns_both_legs() {
        // A matches the keyword with an unrelated vector; B matches the
        // vector with no keyword. Both must appear, A first: equal RRF
        // scores break towards the better lexical rank.
        let store = store();
        let a = indexed_source(&store, "A", "solid electrolyte interface chemistry");
        let b = indexed_source(&store, "B", "unrelated body text");
        store.upsert_embedding(&a.id, &[0.0, 0.0, 0.0, 1.0]).unwrap();
        store.upsert_embedding(&b.id, &[1.0, 0.0, 0.0, 0.0]).unwrap();

        let results = store
            .hybrid_search("electrolyte", &[1.0, 0.0, 0.0, 0.0], 10, None)
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&a.id.as_str()));
        assert!(ids.contains(&b.id.as_str()));
        assert_eq!(ids[0], a.id);
    }

    #[test]
    fn test_hybrid_is_subset_of_legs_without_duplicates() {
        let store = store();
        for i in 0..6 {
            let node = indexed_source(
                &store,
                &format!("S{}", i),
                "electrolyte research material",
            );
            let mut v = [0.0; 4];
            v[i % 4] = 1.0;
            store.upsert_embedding(&node.id, &v).unwrap();
        }

        let query_vec = [1.0, 0.0, 0.0, 0.0];
        let fts: Vec<String> = store
            .fts_search("electrolyte", 20, None)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        let vec: Vec<String> = store
            .vector_search(&query_vec, 20, None)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        let hybrid: Vec<String> = store
            .hybrid_search("electrolyte", &query_vec, 4, None)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();

        let union: HashSet<&String> = fts.iter().chain(vec.iter()).collect();
        let mut seen = HashSet::new();
        for id in &hybrid {
            assert!(union.contains(id));
            assert!(seen.insert(id), "duplicate id in hybrid results");
        }
        assert_eq!(hybrid.len(), 4);
    }
}
