//! Reciprocal rank fusion
//!
//! Combines the dense and sparse ranked lists by summing 1/rank
//! contributions per document. This uses the unshifted denominator (rank,
//! not rank + 60), so absolute fused scores are larger than the
//! conventional RRF formulation; only relative order matters to callers,
//! but the scores themselves are part of the response contract.

use std::collections::HashMap;

use paperdex_core::ScoredDoc;

/// Fuse two ranked lists into the top-k by summed reciprocal rank.
///
/// Ranks are 1-based positions in each input list; a document absent from
/// a list contributes zero from that list. Input scores are ignored
/// entirely, only ranks matter.
pub fn reciprocal_rank_fusion(
    dense: &[ScoredDoc],
    sparse: &[ScoredDoc],
    k: usize,
) -> Vec<ScoredDoc> {
    let mut fused: HashMap<&str, f64> = HashMap::new();

    for (rank, doc) in dense.iter().enumerate() {
        *fused.entry(doc.document_id.as_str()).or_insert(0.0) += 1.0 / (rank as f64 + 1.0);
    }
    for (rank, doc) in sparse.iter().enumerate() {
        *fused.entry(doc.document_id.as_str()).or_insert(0.0) += 1.0 / (rank as f64 + 1.0);
    }

    let mut results: Vec<ScoredDoc> = fused
        .into_iter()
        .map(|(document_id, score)| ScoredDoc::new(document_id, score))
        .collect();

    // Tie-break on document id so identical requests always produce
    // identical lists regardless of map iteration order.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    results.truncate(k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(ids: &[&str]) -> Vec<ScoredDoc> {
        // Input scores are arbitrary: fusion must ignore them.
        ids.iter()
            .enumerate()
            .map(|(i, id)| ScoredDoc::new(*id, 100.0 - i as f64))
            .collect()
    }

    #[test]
    fn test_fusion_ranks_and_scores() {
        let dense = docs(&["A", "B", "C"]);
        let sparse = docs(&["B", "D", "A"]);

        let fused = reciprocal_rank_fusion(&dense, &sparse, 3);

        // B: 1/2 + 1/1 = 1.5; A: 1/1 + 1/3 ~= 1.333; D: 1/2 = 0.5
        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].document_id, "B");
        assert!((fused[0].score - 1.5).abs() < 1e-9);
        assert_eq!(fused[1].document_id, "A");
        assert!((fused[1].score - (1.0 + 1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(fused[2].document_id, "D");
        assert!((fused[2].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fusion_truncates_to_k() {
        let dense = docs(&["A", "B", "C"]);
        let sparse = docs(&["D", "E", "F"]);

        let fused = reciprocal_rank_fusion(&dense, &sparse, 2);
        assert_eq!(fused.len(), 2);
        // Both firsts tie at 1.0 and take the top two slots.
        assert!((fused[0].score - 1.0).abs() < 1e-9);
        assert!((fused[1].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fusion_single_list() {
        let dense = docs(&["A", "B"]);
        let fused = reciprocal_rank_fusion(&dense, &[], 10);

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].document_id, "A");
        assert!((fused[0].score - 1.0).abs() < 1e-9);
        assert!((fused[1].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fusion_both_empty() {
        assert!(reciprocal_rank_fusion(&[], &[], 5).is_empty());
    }

    #[test]
    fn test_fusion_unique_documents() {
        let dense = docs(&["A", "B", "C"]);
        let sparse = docs(&["C", "B", "A"]);
        let fused = reciprocal_rank_fusion(&dense, &sparse, 10);

        assert_eq!(fused.len(), 3);
        let mut ids: Vec<&str> = fused.iter().map(|d| d.document_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
