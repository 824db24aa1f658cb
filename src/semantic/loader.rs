//! fastembed-backed [`ModelLoader`].

use std::path::PathBuf;

use crate::config::SemanticConfig;

use super::embeddings::TextModel;
use super::errors::AiError;
use super::models::{ImageClassifier, ImageEncoder, ModelLoader, TextEncoder};
use super::vision::{ClipClassifier, ImageModel};

pub struct FastembedLoader {
    text_model: String,
    vision_model: String,
    cache_dir: PathBuf,
    show_download_progress: bool,
}

impl FastembedLoader {
    pub fn new(config: &SemanticConfig, cache_dir: PathBuf) -> Self {
        Self {
            text_model: resolve_text_model(&config.text_model, config.quantized),
            vision_model: config.vision_model.clone(),
            cache_dir,
            show_download_progress: config.show_download_progress,
        }
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }
}

/// Pick the quantized variant of `name` when requested and one exists.
pub fn resolve_text_model(name: &str, quantized: bool) -> String {
    if !quantized || name.to_lowercase().ends_with("-q") {
        return name.to_string();
    }
    let candidate = format!("{name}-q");
    match TextModel::parse_model_name(&candidate) {
        Ok(_) => candidate,
        Err(_) => name.to_string(),
    }
}

impl ModelLoader for FastembedLoader {
    fn load_text(&self) -> Result<Box<dyn TextEncoder>, AiError> {
        let model = TextModel::new(
            &self.text_model,
            self.cache_dir.clone(),
            self.show_download_progress,
        )?;
        Ok(Box::new(model))
    }

    fn load_vision(&self) -> Result<Box<dyn ImageEncoder>, AiError> {
        let model = ImageModel::new(
            &self.vision_model,
            self.cache_dir.clone(),
            self.show_download_progress,
        )?;
        Ok(Box::new(model))
    }

    fn load_classifier(&self) -> Result<Box<dyn ImageClassifier>, AiError> {
        let model = ClipClassifier::new(
            &self.vision_model,
            self.cache_dir.clone(),
            self.show_download_progress,
        )?;
        Ok(Box::new(model))
    }
}
