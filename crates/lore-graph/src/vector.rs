//! In-memory HNSW index mirroring the persisted vector table

use hnsw_rs::prelude::*;
use std::collections::HashMap;

/// Distance metric for HNSW - cosine distance
#[derive(Clone)]
struct CosineDistance;

impl Distance<f32> for CosineDistance {
    fn eval(&self, a: &[f32], b: &[f32]) -> f32 {
        // Returns 1 - cosine_similarity (so lower is more similar)
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        (1.0 - (dot / (norm_a * norm_b))).max(0.0)
    }
}

/// HNSW index wrapper that owns its data.
///
/// HNSW cannot delete or replace points, so the wrapper keeps a forward and
/// a reverse id map: removal or replacement just rebinds the maps, and
/// search drops hits whose slot is no longer the node's current binding.
pub(crate) struct VectorIndex {
    hnsw: Hnsw<'static, f32, CosineDistance>,
    /// Stored vectors (we keep ownership here; slots are never freed)
    vectors: Vec<Vec<f32>>,
    /// slot -> node id
    by_slot: HashMap<usize, String>,
    /// node id -> current slot
    by_id: HashMap<String, usize>,
}

impl VectorIndex {
    pub(crate) fn new() -> Self {
        // max_nb_connection = 16, max_elements = 100000, max_layer = 16, ef_construction = 200
        let hnsw = Hnsw::new(16, 100_000, 16, 200, CosineDistance);
        Self {
            hnsw,
            vectors: Vec::new(),
            by_slot: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Insert or replace the vector bound to `node_id`.
    pub(crate) fn insert(&mut self, node_id: &str, vector: Vec<f32>) {
        if let Some(old_slot) = self.by_id.remove(node_id) {
            self.by_slot.remove(&old_slot);
        }

        let slot = self.vectors.len();
        self.vectors.push(vector);
        self.by_slot.insert(slot, node_id.to_string());
        self.by_id.insert(node_id.to_string(), slot);

        // The inner Vec's buffer never moves or drops while the index
        // lives, so handing HNSW a 'static view of it is sound.
        let vec_ref: &'static [f32] = unsafe {
            std::slice::from_raw_parts(self.vectors[slot].as_ptr(), self.vectors[slot].len())
        };
        self.hnsw.insert((vec_ref, slot));
    }

    /// Unbind `node_id`; its slot becomes stale and is filtered at search.
    pub(crate) fn remove(&mut self, node_id: &str) {
        if let Some(slot) = self.by_id.remove(node_id) {
            self.by_slot.remove(&slot);
        }
    }

    /// K-nearest node ids with cosine distances, ascending.
    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if self.by_id.is_empty() || k == 0 {
            return Vec::new();
        }

        let ef = 32.max(2 * k);
        let neighbours = self.hnsw.search(query, k, ef);
        neighbours
            .iter()
            .filter_map(|n| {
                let id = self.by_slot.get(&n.d_id)?;
                // Skip slots that were superseded by a re-insert.
                if self.by_id.get(id) != Some(&n.d_id) {
                    return None;
                }
                Some((id.clone(), n.distance))
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let mut index = VectorIndex::new();
        index.insert("a", vec![1.0, 0.0, 0.0]);
        index.insert("b", vec![0.0, 1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "a");
        assert!(hits[0].1 < hits[1].1);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_replace_drops_stale_slot() {
        let mut index = VectorIndex::new();
        index.insert("a", vec![1.0, 0.0]);
        index.insert("a", vec![0.0, 1.0]);
        assert_eq!(index.len(), 1);

        let hits = index.search(&[0.0, 1.0], 4);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a");
        assert!(hits[0].1 < 0.01);
    }

    #[test]
    fn test_removed_id_not_returned() {
        let mut index = VectorIndex::new();
        index.insert("a", vec![1.0, 0.0]);
        index.insert("b", vec![0.9, 0.1]);
        index.remove("a");

        let hits = index.search(&[1.0, 0.0], 4);
        assert_eq!(hits.into_iter().map(|(id, _)| id).collect::<Vec<_>>(), vec!["b"]);
    }
}
