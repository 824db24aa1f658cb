//! Best-effort zero-shot image tagging.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::labels::LabelVocabulary;
use super::models::LabelScore;
use super::provider::EmbeddingProvider;

/// Scores must be strictly above this to become a tag.
pub const TAG_MIN_SCORE: f32 = 0.1;

/// Maximum number of tags returned per image.
pub const MAX_TAGS: usize = 5;

/// A label that survived the confidence filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    /// Display text: qualifier stripped, translated when a mapping exists
    pub name: String,
    /// Vocabulary label the classifier scored
    pub label: String,
    pub score: f32,
}

pub struct ImageTagger {
    provider: Arc<EmbeddingProvider>,
    vocabulary: LabelVocabulary,
    timeout: Duration,
}

impl ImageTagger {
    pub fn new(provider: Arc<EmbeddingProvider>, vocabulary: LabelVocabulary) -> Self {
        let timeout = provider.timeout();
        Self {
            provider,
            vocabulary,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tag a pre-resized image under the tagger's deadline.
    ///
    /// Never fails: any model error yields an empty list.
    pub async fn classify(&self, image: &[u8]) -> Vec<Tag> {
        self.classify_within(image, self.timeout).await
    }

    pub async fn classify_within(&self, image: &[u8], timeout: Duration) -> Vec<Tag> {
        let labels = self
            .vocabulary
            .labels()
            .into_iter()
            .map(str::to_string)
            .collect();

        match self
            .provider
            .classify_image_within(image, labels, timeout)
            .await
        {
            Ok(scores) => {
                let tags = select_tags(scores, &self.vocabulary);
                log::debug!(
                    "zero-shot tags: {}",
                    tags.iter()
                        .map(|t| format!("{} ({:.2})", t.label, t.score))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                tags
            }
            Err(err) => {
                log::warn!("failed to generate tags: {err}");
                vec![]
            }
        }
    }
}

/// Keep scores above [`TAG_MIN_SCORE`], best first, at most [`MAX_TAGS`].
pub fn select_tags(mut scores: Vec<LabelScore>, vocabulary: &LabelVocabulary) -> Vec<Tag> {
    scores.retain(|s| s.score > TAG_MIN_SCORE);
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores.truncate(MAX_TAGS);

    scores
        .into_iter()
        .map(|s| Tag {
            name: vocabulary.to_tag(&s.label),
            label: s.label,
            score: s.score,
        })
        .collect()
}
