//! Upload analysis: prepare a photo, embed it, and tag it.
//!
//! Always produces a report. Failures degrade to an empty embedding and tag
//! list with a warning the caller can surface.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::images::{self, MODEL_INPUT_SIZE};
use crate::semantic::{EmbeddingProvider, EmbeddingVector, ImageTagger, Tag};

pub const WARNING_IMAGE_PROCESSING: &str = "Image processing failed";
pub const WARNING_AI_TIMEOUT: &str = "AI analysis timed out";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Always true: a degraded analysis is reported through `warning`
    pub success: bool,
    pub embedding: EmbeddingVector,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AnalysisReport {
    fn degraded(warning: &str) -> Self {
        Self {
            success: true,
            embedding: vec![],
            tags: vec![],
            warning: Some(warning.to_string()),
        }
    }
}

/// Deadlines for the two model stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzeOpts {
    pub embed_timeout: Duration,
    pub tag_timeout: Duration,
}

impl Default for AnalyzeOpts {
    fn default() -> Self {
        Self {
            embed_timeout: Duration::from_secs(60),
            tag_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Analyzer {
    provider: Arc<EmbeddingProvider>,
    tagger: ImageTagger,
    opts: AnalyzeOpts,
}

impl Analyzer {
    pub fn new(provider: Arc<EmbeddingProvider>, tagger: ImageTagger, opts: AnalyzeOpts) -> Self {
        Self {
            provider,
            tagger,
            opts,
        }
    }

    /// Analyze a raw upload.
    pub async fn analyze(&self, upload: &[u8]) -> AnalysisReport {
        log::info!("analyzing image ({}KB)", upload.len() / 1024);

        let prepared = match images::prepare_for_model(upload, MODEL_INPUT_SIZE) {
            Ok(prepared) => prepared,
            Err(err) => {
                log::warn!("image processing failed: {err:#}");
                return AnalysisReport::degraded(WARNING_IMAGE_PROCESSING);
            }
        };

        let embedding = match self
            .provider
            .embed_image_within(&prepared.data, self.opts.embed_timeout)
            .await
        {
            Ok(embedding) => embedding,
            Err(err) => {
                log::warn!("AI analysis failed or timed out: {err}");
                return AnalysisReport::degraded(WARNING_AI_TIMEOUT);
            }
        };
        log::info!("embedding generated: {} dimensions", embedding.len());

        let tags: Vec<String> = self
            .tagger
            .classify_within(&prepared.data, self.opts.tag_timeout)
            .await
            .into_iter()
            .map(|tag: Tag| tag.name)
            .collect();
        log::info!("tags generated: {}", tags.join(", "));

        AnalysisReport {
            success: true,
            embedding,
            tags,
            warning: None,
        }
    }
}
