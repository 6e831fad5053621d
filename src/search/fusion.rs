//! Rank fusion for the hybrid retriever (C6).
//!
//! Two schemes over per-index rankings: weighted reciprocal rank
//! (alpha-weighted, the primary) and parameter-free Reciprocal Rank
//! Fusion with the standard constant c = 60.

use std::collections::HashMap;

/// RRF constant from Cormack, Clarke & Buettcher (2009).
pub const RRF_C: f64 = 60.0;

/// Weighted-rank fusion of a lexical and a vector ranking.
///
/// An id at 1-based rank `r` contributes `alpha / r` from the lexical
/// list and `(1 - alpha) / r` from the vector list. Returns the top-k ids
/// by accumulated score.
///
/// # Examples
///
/// ```
/// use docdex::search::weighted_rank_fusion;
///
/// let lexical = vec!["A".to_string(), "B".to_string(), "C".to_string()];
/// let vector = vec!["B".to_string(), "D".to_string(), "A".to_string()];
/// let fused = weighted_rank_fusion(&lexical, &vector, 0.7, 2);
/// assert_eq!(fused, vec!["A".to_string(), "B".to_string()]);
/// ```
#[must_use]
pub fn weighted_rank_fusion(
    lexical: &[String],
    vector: &[String],
    alpha: f64,
    top_k: usize,
) -> Vec<String> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    accumulate(&mut scores, lexical, alpha);
    accumulate(&mut scores, vector, 1.0 - alpha);
    take_top(scores, lexical, vector, top_k)
}

/// Reciprocal Rank Fusion of a lexical and a vector ranking.
///
/// An id at 1-based rank `r` contributes `1 / (c + r)` from each list it
/// appears in. Parameter-free alternative to the weighted scheme.
#[must_use]
pub fn rrf_fusion(lexical: &[String], vector: &[String], top_k: usize) -> Vec<String> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    for (rank, id) in lexical.iter().enumerate() {
        *scores.entry(id.as_str()).or_insert(0.0) += 1.0 / (RRF_C + rank as f64 + 1.0);
    }
    for (rank, id) in vector.iter().enumerate() {
        *scores.entry(id.as_str()).or_insert(0.0) += 1.0 / (RRF_C + rank as f64 + 1.0);
    }
    take_top(scores, lexical, vector, top_k)
}

fn accumulate<'a>(scores: &mut HashMap<&'a str, f64>, ranking: &'a [String], weight: f64) {
    for (rank, id) in ranking.iter().enumerate() {
        *scores.entry(id.as_str()).or_insert(0.0) += weight / (rank as f64 + 1.0);
    }
}

/// Sorts accumulated scores descending; ties break by the id's best rank
/// across the two input lists so the output stays deterministic.
fn take_top(
    scores: HashMap<&str, f64>,
    lexical: &[String],
    vector: &[String],
    top_k: usize,
) -> Vec<String> {
    let best_rank = |id: &str| {
        let a = lexical.iter().position(|x| x == id);
        let b = vector.iter().position(|x| x == id);
        match (a, b) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => usize::MAX,
        }
    };

    let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| best_rank(a.0).cmp(&best_rank(b.0)))
    });
    ranked
        .into_iter()
        .take(top_k)
        .map(|(id, _)| id.to_string())
        .collect()
}
