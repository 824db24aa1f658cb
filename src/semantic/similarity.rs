//! Cosine similarity and ranking over embedding vectors.
//!
//! Everything here is pure and stateless.

use serde::{Deserialize, Serialize};

use super::errors::AiError;

/// An identifier paired with a similarity or confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub id: u64,
    pub score: f32,
}

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Cosine similarity between two vectors.
///
/// Vectors of different length score 0, as does any pair involving a zero
/// vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    checked_cosine_similarity(a, b).unwrap_or(0.0)
}

/// Like [`cosine_similarity`] but reports a length mismatch instead of
/// scoring it 0.
pub fn checked_cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, AiError> {
    if a.len() != b.len() {
        return Err(AiError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot_product / (norm_a.sqrt() * norm_b.sqrt());
    Ok(score.clamp(-1.0, 1.0))
}

/// Score every candidate against `query`, keep those at or above
/// `threshold`, and return at most `limit` of them, best first.
///
/// Equal scores keep their input order.
pub fn rank<'a, I>(query: &[f32], candidates: I, threshold: f32, limit: usize) -> Vec<ScoredMatch>
where
    I: IntoIterator<Item = (u64, &'a [f32])>,
{
    let mut results: Vec<ScoredMatch> = candidates
        .into_iter()
        .filter_map(|(id, embedding)| {
            let score = cosine_similarity(query, embedding);
            if score >= threshold {
                Some(ScoredMatch { id, score })
            } else {
                None
            }
        })
        .collect();

    // sort_by is stable, ties stay in candidate order
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_identical_vectors() {
        let v = vec![0.3, -1.2, 4.0, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_opposite_vectors() {
        let v = vec![0.3, -1.2, 4.0, 0.01];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&v, &neg) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < EPS);
    }

    #[test]
    fn test_magnitude_is_ignored() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![10.0, 20.0, 30.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!(matches!(
            checked_cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]),
            Err(AiError::DimensionMismatch {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < EPS);
        assert!((v[1] - 0.8).abs() < EPS);
        assert!((l2_norm(&v) - 1.0).abs() < EPS);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_rank_threshold_and_order() {
        let query = vec![1.0, 0.0, 0.0];
        let a = vec![0.0, 1.0, 0.0];
        let b = vec![1.0, 0.1, 0.0];
        let c = vec![1.0, 0.5, 0.0];
        let candidates = vec![(1, a.as_slice()), (2, b.as_slice()), (3, c.as_slice())];

        let results = rank(&query, candidates, 0.3, 10);
        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_rank_limit() {
        let query = vec![1.0, 0.0];
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32 * 0.1]).collect();
        let candidates = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u64, v.as_slice()));

        let results = rank(&query, candidates, 0.0, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, 0);
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let query = vec![1.0, 0.0];
        let same = vec![2.0, 0.0];
        let candidates = vec![
            (7, same.as_slice()),
            (3, same.as_slice()),
            (9, same.as_slice()),
        ];

        let ids: Vec<u64> = rank(&query, candidates, 0.0, 10)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![7, 3, 9]);
    }
}
