//! Reciprocal Rank Fusion.
//!
//! Each list contributes `weight / (K + rank + 1)` per item, with
//! `rank` 0-based within its own list. `K = 60` damps the head of each
//! list so a single top rank cannot dominate the fusion.

use std::collections::HashMap;

use crate::store::QueryResult;

/// RRF damping constant.
pub const RRF_K: f32 = 60.0;

/// Fuse two ranked lists. The semantic list is weighted by
/// `semantic_weight`, the keyword list by `1 - semantic_weight`.
/// Content and metadata are carried from whichever list saw the id
/// last; the output is sorted by fused score descending (ties broken by
/// id for determinism) and truncated to `n_results`.
pub fn rrf_fuse(
    semantic: Vec<QueryResult>,
    keyword: Vec<QueryResult>,
    semantic_weight: f32,
    n_results: usize,
) -> Vec<QueryResult> {
    let mut fused: HashMap<String, QueryResult> = HashMap::new();

    for (rank, mut result) in semantic.into_iter().enumerate() {
        let contribution = semantic_weight * (1.0 / (RRF_K + rank as f32 + 1.0));
        result.score = contribution;
        fused
            .entry(result.id.clone())
            .and_modify(|existing| existing.score += contribution)
            .or_insert(result);
    }

    let keyword_weight = 1.0 - semantic_weight;
    for (rank, mut result) in keyword.into_iter().enumerate() {
        let contribution = keyword_weight * (1.0 / (RRF_K + rank as f32 + 1.0));
        match fused.get_mut(&result.id) {
            Some(existing) => {
                existing.score += contribution;
                existing.content = result.content;
                existing.metadata = result.metadata;
            }
            None => {
                result.score = contribution;
                fused.insert(result.id.clone(), result);
            }
        }
    }

    let mut results: Vec<QueryResult> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(n_results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> QueryResult {
        QueryResult {
            id: id.to_string(),
            content: format!("content {id}"),
            metadata: Default::default(),
            score: 0.9,
        }
    }

    fn hits(ids: &[&str]) -> Vec<QueryResult> {
        ids.iter().map(|id| hit(id)).collect()
    }

    fn order(results: &[QueryResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn identical_lists_preserve_order_for_any_weight() {
        for weight in [0.1_f32, 0.5, 0.7, 0.9] {
            let fused = rrf_fuse(hits(&["a", "b", "c"]), hits(&["a", "b", "c"]), weight, 10);
            assert_eq!(order(&fused), ["a", "b", "c"], "weight {weight}");
        }
    }

    #[test]
    fn items_in_both_lists_outrank_single_list_items() {
        // "b" is rank 1 in both lists; "a" and "k" lead one list each.
        let fused = rrf_fuse(hits(&["a", "b"]), hits(&["k", "b"]), 0.5, 10);
        assert_eq!(order(&fused)[0], "b");
    }

    #[test]
    fn raising_semantic_weight_never_demotes_semantic_only_items() {
        // "s" only in the semantic list, "k" only in the keyword list,
        // both at rank 0 in their own lists.
        let rank_gap = |weight: f32| {
            let fused = rrf_fuse(hits(&["s"]), hits(&["k"]), weight, 10);
            let pos = |id: &str| fused.iter().position(|r| r.id == id).unwrap() as i32;
            pos("k") - pos("s")
        };
        assert!(rank_gap(0.9) >= rank_gap(0.3));
        // At 0.9 the semantic item must actually win.
        let fused = rrf_fuse(hits(&["s"]), hits(&["k"]), 0.9, 10);
        assert_eq!(order(&fused), ["s", "k"]);
    }

    #[test]
    fn scores_follow_the_rrf_formula() {
        let fused = rrf_fuse(hits(&["a"]), hits(&["a"]), 0.7, 10);
        let expected = 0.7 / 61.0 + 0.3 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-6);

        let fused = rrf_fuse(hits(&["a", "b"]), Vec::new(), 0.7, 10);
        assert!((fused[0].score - 0.7 / 61.0).abs() < 1e-6);
        assert!((fused[1].score - 0.7 / 62.0).abs() < 1e-6);
    }

    #[test]
    fn truncates_to_n_results() {
        let fused = rrf_fuse(hits(&["a", "b", "c", "d"]), hits(&["e", "f"]), 0.7, 3);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        assert!(rrf_fuse(Vec::new(), Vec::new(), 0.7, 5).is_empty());
    }
}
