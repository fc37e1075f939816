//! Full-scan similarity ranking
//!
//! Scores every candidate against the query: O(n) per query, sized for
//! corpora of a few thousand records.

use std::cmp::Ordering;
use tracing::warn;

use super::vectordb::StoredRecord;
use crate::core::record::Record;

/// Dot product of two unit vectors, i.e. their cosine similarity.
///
/// Empty vectors and vectors of different lengths score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Score, sort and truncate candidates.
///
/// Sorted by descending score, ties by ascending id. Returns at most
/// `max(top_k, 0)` entries.
pub fn rank<R: Record>(query: &[f32], candidates: Vec<StoredRecord<R>>, top_k: i64) -> Vec<(R, f32)> {
    let limit = top_k.max(0) as usize;
    if limit == 0 {
        return Vec::new();
    }

    let mut skewed = 0usize;
    let mut scored: Vec<(R, f32)> = candidates
        .into_iter()
        .map(|candidate| {
            if candidate.embedding.len() != query.len() {
                skewed += 1;
            }
            let score = cosine_similarity(query, &candidate.embedding);
            (candidate.record, score)
        })
        .collect();

    if skewed > 0 {
        warn!(
            "{} {} records have a different embedding dimension than the query; rebuild the index",
            skewed,
            R::NAMESPACE
        );
    }

    scored.sort_by(by_score_then_id);
    scored.truncate(limit);
    scored
}

fn by_score_then_id<R: Record>(a: &(R, f32), b: &(R, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.id().cmp(b.0.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::TaskIn;
    use crate::search::embedding::l2_normalize;

    fn candidate(id: &str, embedding: Vec<f32>) -> StoredRecord<TaskIn> {
        StoredRecord {
            record: TaskIn::new(id, format!("task {}", id)),
            embedding,
        }
    }

    fn ids(ranked: &[(TaskIn, f32)]) -> Vec<&str> {
        ranked.iter().map(|(t, _)| t.id.as_str()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_degenerate_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_self_similarity_is_maximal() {
        let mut v = vec![0.3, -1.2, 4.0, 0.7, 0.01];
        l2_normalize(&mut v);
        let mut other = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        l2_normalize(&mut other);

        let ranked = rank(
            &v,
            vec![candidate("other", other), candidate("self", v.clone())],
            5,
        );
        assert_eq!(ranked[0].0.id, "self");
        assert!((ranked[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sort_and_truncate() {
        let query = vec![1.0, 0.0];
        let ranked = rank(
            &query,
            vec![
                candidate("low", vec![0.0, 1.0]),
                candidate("high", vec![1.0, 0.0]),
                candidate("mid", vec![0.6, 0.8]),
            ],
            2,
        );
        assert_eq!(ids(&ranked), vec!["high", "mid"]);
    }

    #[test]
    fn test_ties_break_by_id() {
        let query = vec![1.0, 0.0];
        let ranked = rank(
            &query,
            vec![
                candidate("b", vec![0.6, 0.8]),
                candidate("c", vec![1.0, 0.0]),
                candidate("a", vec![0.6, 0.8]),
            ],
            10,
        );
        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_non_positive_top_k_is_empty() {
        let query = vec![1.0];
        for top_k in [0, -1, -100] {
            let ranked = rank(&query, vec![candidate("a", vec![1.0])], top_k);
            assert!(ranked.is_empty());
        }
    }

    #[test]
    fn test_skewed_dimension_scores_zero() {
        let ranked = rank(
            &[1.0, 0.0],
            vec![candidate("old", vec![1.0, 0.0, 0.0]), candidate("new", vec![0.6, 0.8])],
            2,
        );
        assert_eq!(ids(&ranked), vec!["new", "old"]);
        assert_eq!(ranked[1].1, 0.0);
    }
}
