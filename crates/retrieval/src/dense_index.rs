//! Dense ANN search over the HNSW index
//!
//! The index is built offline and reloaded from its two-file dump
//! (`<basename>.hnsw.graph` / `<basename>.hnsw.data`). Point ids are the
//! `documents.id` values of the sparse index, so both indices cover the
//! same document space.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use hnsw_rs::hnswio::HnswIo;
use hnsw_rs::prelude::*;

use paperdex_core::ScoredDoc;

use crate::RetrievalError;

/// Additive distance epsilon: keeps the inverse-distance score finite for
/// exact matches. Part of the score contract, do not change.
const DISTANCE_EPSILON: f64 = 1e-8;

/// Read-only handle to the dense ANN index
pub struct DenseIndex {
    hnsw: Hnsw<'static, f32, DistL2>,
}

impl DenseIndex {
    /// Wrap an already-built index (tests build small ones in memory)
    pub fn new(hnsw: Hnsw<'static, f32, DistL2>) -> Self {
        Self { hnsw }
    }

    /// Reload the index from its dump files in `dir`.
    ///
    /// The dump reader keeps ownership of the mapped data while the graph
    /// borrows from it; the index lives for the whole process (it is
    /// immutable after load), so the reader is intentionally leaked to get
    /// the 'static borrow.
    pub fn load(dir: &Path, basename: &str) -> Result<Self, RetrievalError> {
        let reloader: &'static mut HnswIo = Box::leak(Box::new(HnswIo::new(dir, basename)));
        let hnsw = reloader
            .load_hnsw::<f32, DistL2>()
            .map_err(|e| RetrievalError::Index(format!("Failed to reload ANN index: {}", e)))?;

        tracing::info!(
            points = hnsw.get_nb_point(),
            dimension = hnsw.get_point_indexation().get_data_dimension(),
            "Dense index loaded"
        );

        Ok(Self { hnsw })
    }

    /// Vector width the index was built with
    pub fn dimension(&self) -> usize {
        self.hnsw.get_point_indexation().get_data_dimension()
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.hnsw.get_nb_point()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw nearest-neighbour lookup: `(slot_id, distance)` in ANN order
    pub fn nearest(&self, embedding: &[f32], n: usize, ef: usize) -> Vec<(usize, f32)> {
        self.hnsw
            .search(embedding, n, ef)
            .into_iter()
            .map(|neighbour| (neighbour.d_id, neighbour.distance))
            .collect()
    }
}

/// Collapse raw ANN neighbours into a ranked document list.
///
/// Walks neighbours in returned order, keeps the first occurrence of each
/// document, drops later duplicates, truncates to `k`. Slot ids missing
/// from the document map are skipped and logged. Emitted score is
/// `1 / (distance + 1e-8)` so higher is better and exact matches stay
/// finite.
pub fn dedup_neighbours(
    neighbours: &[(usize, f32)],
    doc_map: &HashMap<usize, String>,
    k: usize,
) -> Vec<ScoredDoc> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut results = Vec::with_capacity(k);

    for (slot, distance) in neighbours {
        if results.len() == k {
            break;
        }
        let Some(document_id) = doc_map.get(slot) else {
            tracing::warn!(slot = *slot, "ANN neighbour has no documents-table entry, skipping");
            continue;
        };
        if seen.insert(document_id.as_str()) {
            results.push(ScoredDoc {
                document_id: document_id.clone(),
                score: 1.0 / (f64::from(*distance) + DISTANCE_EPSILON),
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_map(ids: &[usize]) -> HashMap<usize, String> {
        ids.iter().map(|id| (*id, format!("paper-{}", id))).collect()
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        // Neighbour stream with repeats: 5 appears three times, 7 twice.
        let neighbours = vec![
            (5, 0.1f32),
            (5, 0.1),
            (7, 0.2),
            (5, 0.3),
            (9, 0.4),
            (7, 0.5),
            (2, 0.6),
            (8, 0.7),
        ];
        let map = doc_map(&[2, 5, 7, 8, 9]);

        let results = dedup_neighbours(&neighbours, &map, 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].document_id, "paper-5");
        assert_eq!(results[1].document_id, "paper-7");
        assert_eq!(results[2].document_id, "paper-9");

        assert_eq!(results[0].score, 1.0 / (f64::from(0.1f32) + 1e-8));
        assert_eq!(results[1].score, 1.0 / (f64::from(0.2f32) + 1e-8));
        assert_eq!(results[2].score, 1.0 / (f64::from(0.4f32) + 1e-8));
    }

    #[test]
    fn test_dedup_zero_distance_is_finite() {
        let neighbours = vec![(1, 0.0f32)];
        let results = dedup_neighbours(&neighbours, &doc_map(&[1]), 5);
        assert_eq!(results.len(), 1);
        assert!(results[0].score.is_finite());
        assert_eq!(results[0].score, 1.0 / 1e-8);
    }

    #[test]
    fn test_dedup_skips_unmapped_slots() {
        let neighbours = vec![(1, 0.1f32), (99, 0.2), (2, 0.3)];
        let results = dedup_neighbours(&neighbours, &doc_map(&[1, 2]), 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "paper-1");
        assert_eq!(results[1].document_id, "paper-2");
    }

    #[test]
    fn test_dedup_truncates_to_k() {
        let neighbours: Vec<(usize, f32)> = (0..10).map(|i| (i, i as f32 * 0.1)).collect();
        let map = doc_map(&(0..10).collect::<Vec<_>>());
        let results = dedup_neighbours(&neighbours, &map, 4);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_nearest_on_built_index() {
        let hnsw = Hnsw::<f32, DistL2>::new(16, 32, 16, 200, DistL2);
        hnsw.insert((&[0.0f32, 0.0], 1));
        hnsw.insert((&[1.0f32, 0.0], 2));
        hnsw.insert((&[10.0f32, 10.0], 3));
        let index = DenseIndex::new(hnsw);

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 2);

        let neighbours = index.nearest(&[0.1, 0.0], 2, 32);
        assert_eq!(neighbours.len(), 2);
        assert_eq!(neighbours[0].0, 1);
        assert_eq!(neighbours[1].0, 2);
        assert!(neighbours[0].1 <= neighbours[1].1);
    }
}
