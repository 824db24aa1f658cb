//! Text embedding model wrapper for fastembed.
//!
//! - Model download into a configurable cache directory on first use
//! - Dimension probing so callers know the vector width up front
//! - Batch embedding behind a mutex (fastembed's embed() takes &mut self)

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

use super::errors::AiError;
use super::models::{EmbeddingVector, ModelKind, TextEncoder};

/// Wrapper around fastembed's TextEmbedding model.
pub struct TextModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl TextModel {
    /// Load the named model, downloading it into `cache_dir` if needed.
    ///
    /// # Arguments
    /// * `model_name` - Name of the model (e.g., "all-MiniLM-L6-v2")
    /// * `cache_dir` - Directory to cache downloaded models
    /// * `show_download_progress` - Draw fastembed's download progress bar
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, AiError> {
        let model_enum = Self::parse_model_name(model_name)?;

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            AiError::unavailable(
                ModelKind::Text,
                format!("failed to create models directory: {}", e),
            )
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(show_download_progress);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| AiError::unavailable(ModelKind::Text, e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    /// Parse model name string to fastembed enum.
    pub fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, AiError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" | "bgesmallenv15q" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15Q)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" | "bgebaseenv15q" => {
                Ok(fastembed::EmbeddingModel::BGEBaseENV15Q)
            }
            "clip-vit-b-32" | "clipvitb32" => Ok(fastembed::EmbeddingModel::ClipVitB32),
            _ => Err(AiError::unavailable(
                ModelKind::Text,
                format!(
                    "unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, clip-vit-b-32 (add -q suffix for quantized)",
                    name
                ),
            )),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, AiError> {
        let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
            AiError::unavailable(
                ModelKind::Text,
                format!("failed to probe dimensions: {}", e),
            )
        })?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| AiError::unavailable(ModelKind::Text, "model returned no embedding"))
    }
}

impl TextEncoder for TextModel {
    fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, AiError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self
            .model
            .lock()
            .map_err(|e| AiError::inference(format!("failed to acquire model lock: {}", e)))?;

        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(AiError::inference)?;

        if embeddings.len() != texts.len() {
            return Err(AiError::inference(format!(
                "expected {} embeddings, model returned {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
