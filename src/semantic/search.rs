//! Semantic search over lost-and-found posts.
//!
//! Embeds the query and every candidate's text, ranks candidates by cosine
//! similarity, and falls back to an order-based ranking when the model
//! pipeline fails so a search never hard-fails.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::errors::AiError;
use super::provider::EmbeddingProvider;
use super::similarity::{rank, ScoredMatch};
use super::{DEFAULT_THRESHOLD, DEFAULT_TOP_K};

/// Step between synthetic scores in the fallback ranking.
const FALLBACK_SCORE_STEP: f32 = 0.1;

/// A post offered for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
}

impl Candidate {
    pub fn new(id: u64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
        }
    }

    /// Text embedded for this candidate: title then body, space-joined.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// How the scores in a [`SearchOutcome`] were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// Cosine similarity of model embeddings
    Model,
    /// Candidate order with synthetic descending scores
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub matches: Vec<ScoredMatch>,
    pub mode: RankingMode,
}

impl SearchOutcome {
    pub fn is_fallback(&self) -> bool {
        self.mode == RankingMode::Fallback
    }

    pub fn ids(&self) -> Vec<u64> {
        self.matches.iter().map(|m| m.id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

pub struct SemanticSearch {
    provider: Arc<EmbeddingProvider>,
    defaults: SearchOptions,
}

impl SemanticSearch {
    pub fn new(provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            provider,
            defaults: SearchOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: SearchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> SearchOptions {
        self.defaults
    }

    /// Rank `candidates` against `query` with the configured top-k and
    /// threshold.
    pub async fn search(&self, query: &str, candidates: &[Candidate]) -> SearchOutcome {
        self.find_similar(query, candidates, self.defaults.top_k, self.defaults.threshold)
            .await
    }

    /// Rank `candidates` against `query` under the provider's deadline.
    ///
    /// Returns at most `top_k` matches scoring at least `threshold`, best
    /// first, ties in candidate order. If embedding fails the outcome is the
    /// fallback ranking instead.
    pub async fn find_similar(
        &self,
        query: &str,
        candidates: &[Candidate],
        top_k: usize,
        threshold: f32,
    ) -> SearchOutcome {
        self.find_similar_within(query, candidates, top_k, threshold, self.provider.timeout())
            .await
    }

    /// Like [`find_similar`](Self::find_similar), with `timeout` bounding the
    /// whole search: query and candidate embedding share one deadline.
    pub async fn find_similar_within(
        &self,
        query: &str,
        candidates: &[Candidate],
        top_k: usize,
        threshold: f32,
        timeout: Duration,
    ) -> SearchOutcome {
        if candidates.is_empty() || top_k == 0 {
            return SearchOutcome {
                matches: vec![],
                mode: RankingMode::Model,
            };
        }

        let deadline = Instant::now() + timeout;
        let embedded = async {
            let query_embedding = self.provider.embed_text_within(query, timeout).await?;
            let texts = candidates.iter().map(Candidate::text).collect();
            let remaining = deadline.saturating_duration_since(Instant::now());
            let candidate_embeddings = self.provider.embed_texts_within(texts, remaining).await?;
            Ok::<_, AiError>((query_embedding, candidate_embeddings))
        };

        let embedded = match tokio::time::timeout_at(deadline, embedded).await {
            Ok(result) => result,
            Err(_) => Err(AiError::Timeout(timeout)),
        };

        match embedded {
            Ok((query_embedding, candidate_embeddings)) => {
                let scored = candidates
                    .iter()
                    .zip(candidate_embeddings.iter())
                    .map(|(candidate, embedding)| (candidate.id, embedding.as_slice()));

                SearchOutcome {
                    matches: rank(&query_embedding, scored, threshold, top_k),
                    mode: RankingMode::Model,
                }
            }
            Err(err) => {
                if err.is_permanent() {
                    log::warn!("text model unavailable, ranking by candidate order: {err}");
                } else {
                    log::warn!(
                        "semantic search failed, falling back to candidate order: {}",
                        err
                    );
                }
                SearchOutcome {
                    matches: fallback_ranking(candidates, top_k),
                    mode: RankingMode::Fallback,
                }
            }
        }
    }
}

/// The first `top_k` candidates in input order with scores 1.0, 0.9, 0.8, ...
pub fn fallback_ranking(candidates: &[Candidate], top_k: usize) -> Vec<ScoredMatch> {
    candidates
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(i, candidate)| ScoredMatch {
            id: candidate.id,
            score: 1.0 - i as f32 * FALLBACK_SCORE_STEP,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_text() {
        let candidate = Candidate::new(1, "Lost wallet", "brown leather");
        assert_eq!(candidate.text(), "Lost wallet brown leather");
    }

    #[test]
    fn test_candidate_accepts_content_alias() {
        let candidate: Candidate =
            serde_json::from_str(r#"{"id": 3, "title": "Keys", "content": "on a red ring"}"#)
                .unwrap();
        assert_eq!(candidate.body, "on a red ring");
    }

    #[test]
    fn test_fallback_ranking() {
        let candidates: Vec<Candidate> = (0..4)
            .map(|i| Candidate::new(100 + i, "t", "b"))
            .collect();

        let matches = fallback_ranking(&candidates, 3);
        assert_eq!(matches.len(), 3);
        assert_eq!(
            matches.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![100, 101, 102]
        );
        assert!((matches[0].score - 1.0).abs() < f32::EPSILON);
        assert!(matches.windows(2).all(|w| w[0].score > w[1].score));
    }

    #[test]
    fn test_fallback_with_small_pool() {
        let candidates = vec![Candidate::new(1, "a", "b")];
        assert_eq!(fallback_ranking(&candidates, 10).len(), 1);
        assert!(fallback_ranking(&[], 10).is_empty());
    }

    #[test]
    fn test_outcome_serializes_mode() {
        let outcome = SearchOutcome {
            matches: vec![ScoredMatch { id: 1, score: 1.0 }],
            mode: RankingMode::Fallback,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["mode"], "fallback");
        assert_eq!(json["matches"][0]["id"], 1);
    }
}
