//! CLIP image embedding and zero-shot classification via fastembed.
//!
//! The classifier embeds the image with the CLIP vision tower and each label
//! prompt with the CLIP text tower, then turns the scaled cosine similarities
//! into a probability distribution over the labels.

use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, TextEmbedding};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use super::errors::AiError;
use super::models::{EmbeddingVector, ImageClassifier, ImageEncoder, LabelScore, ModelKind};
use super::similarity::cosine_similarity;

/// Prompt each label is wrapped in before text encoding.
pub const HYPOTHESIS_TEMPLATE: &str = "This is a photo of {}.";

/// CLIP's learned temperature (exp of the logit scale) for ViT-B/32.
const CLIP_LOGIT_SCALE: f32 = 100.0;

pub fn parse_vision_model_name(name: &str) -> Result<ImageEmbeddingModel, AiError> {
    match name.to_lowercase().as_str() {
        "clip-vit-b-32" | "clipvitb32" | "clip-vit-base-patch32" => {
            Ok(ImageEmbeddingModel::ClipVitB32)
        }
        _ => Err(AiError::unavailable(
            ModelKind::Vision,
            format!("unknown vision model: {}. Supported models: clip-vit-b-32", name),
        )),
    }
}

fn load_image_embedding(
    kind: ModelKind,
    model_name: &str,
    cache_dir: PathBuf,
    show_download_progress: bool,
) -> Result<ImageEmbedding, AiError> {
    let model_enum = parse_vision_model_name(model_name)
        .map_err(|e| AiError::unavailable(kind, e.to_string()))?;

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        AiError::unavailable(kind, format!("failed to create models directory: {}", e))
    })?;

    let options = ImageInitOptions::new(model_enum)
        .with_cache_dir(cache_dir)
        .with_show_download_progress(show_download_progress);

    ImageEmbedding::try_new(options).map_err(|e| AiError::unavailable(kind, e.to_string()))
}

fn embed_one(model: &Mutex<ImageEmbedding>, image: &[u8]) -> Result<EmbeddingVector, AiError> {
    let mut model = model
        .lock()
        .map_err(|e| AiError::inference(format!("failed to acquire model lock: {}", e)))?;

    let embeddings = model
        .embed_bytes(&[image], None)
        .map_err(AiError::inference)?;

    embeddings
        .into_iter()
        .next()
        .ok_or_else(|| AiError::inference("no embedding returned"))
}

/// Probe the model with a blank frame to determine embedding dimensions.
fn probe_dimensions(model: &Mutex<ImageEmbedding>) -> Result<usize, AiError> {
    let size = crate::images::MODEL_INPUT_SIZE;
    let mut png = Vec::new();
    image::RgbImage::new(size, size)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| {
            AiError::unavailable(
                ModelKind::Vision,
                format!("failed to build probe image: {}", e),
            )
        })?;

    embed_one(model, &png).map(|v| v.len()).map_err(|e| {
        AiError::unavailable(
            ModelKind::Vision,
            format!("failed to probe dimensions: {}", e),
        )
    })
}

/// Wrapper around fastembed's ImageEmbedding model.
pub struct ImageModel {
    model: Mutex<ImageEmbedding>,
    dimensions: usize,
}

impl ImageModel {
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, AiError> {
        let model = load_image_embedding(
            ModelKind::Vision,
            model_name,
            cache_dir,
            show_download_progress,
        )?;
        let model = Mutex::new(model);
        let dimensions = probe_dimensions(&model)?;

        Ok(Self { model, dimensions })
    }
}

impl ImageEncoder for ImageModel {
    fn embed(&self, image: &[u8]) -> Result<EmbeddingVector, AiError> {
        embed_one(&self.model, image)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Zero-shot image classifier built from the two CLIP towers.
pub struct ClipClassifier {
    vision: Mutex<ImageEmbedding>,
    text: Mutex<TextEmbedding>,
    /// Prompt embeddings keyed by label, filled on first use of each label.
    label_embeddings: Mutex<HashMap<String, EmbeddingVector>>,
}

impl ClipClassifier {
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, AiError> {
        let vision = load_image_embedding(
            ModelKind::Classifier,
            model_name,
            cache_dir.clone(),
            show_download_progress,
        )?;

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::ClipVitB32)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(show_download_progress);
        let text = TextEmbedding::try_new(options)
            .map_err(|e| AiError::unavailable(ModelKind::Classifier, e.to_string()))?;

        Ok(Self {
            vision: Mutex::new(vision),
            text: Mutex::new(text),
            label_embeddings: Mutex::new(HashMap::new()),
        })
    }

    fn label_embeddings(&self, labels: &[&str]) -> Result<Vec<EmbeddingVector>, AiError> {
        let mut cache = self
            .label_embeddings
            .lock()
            .map_err(|e| AiError::inference(format!("failed to acquire label cache: {}", e)))?;

        let missing: Vec<&str> = labels
            .iter()
            .copied()
            .filter(|label| !cache.contains_key(*label))
            .collect();

        if !missing.is_empty() {
            let prompts: Vec<String> = missing
                .iter()
                .map(|label| HYPOTHESIS_TEMPLATE.replace("{}", label))
                .collect();

            let mut text = self
                .text
                .lock()
                .map_err(|e| AiError::inference(format!("failed to acquire model lock: {}", e)))?;
            let embeddings = text.embed(prompts, None).map_err(AiError::inference)?;

            if embeddings.len() != missing.len() {
                return Err(AiError::inference("label embedding count mismatch"));
            }
            for (label, embedding) in missing.into_iter().zip(embeddings) {
                cache.insert(label.to_string(), embedding);
            }
        }

        labels
            .iter()
            .map(|label| {
                cache
                    .get(*label)
                    .cloned()
                    .ok_or_else(|| AiError::inference(format!("missing embedding for '{label}'")))
            })
            .collect()
    }
}

impl ImageClassifier for ClipClassifier {
    fn classify(&self, image: &[u8], labels: &[&str]) -> Result<Vec<LabelScore>, AiError> {
        if labels.is_empty() {
            return Ok(vec![]);
        }

        let image_embedding = embed_one(&self.vision, image)?;
        let label_embeddings = self.label_embeddings(labels)?;

        let logits: Vec<f32> = label_embeddings
            .iter()
            .map(|label| CLIP_LOGIT_SCALE * cosine_similarity(&image_embedding, label))
            .collect();

        Ok(labels
            .iter()
            .zip(softmax(&logits))
            .map(|(label, score)| LabelScore {
                label: label.to_string(),
                score,
            })
            .collect())
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|x| x / sum).collect()
}
