//! Model abstractions shared by the provider, the tagger and the loaders.
//!
//! The concrete fastembed-backed implementations live in `embeddings` and
//! `vision`; tests substitute their own loaders through [`ModelLoader`].

use std::fmt;

use super::errors::AiError;

/// Dense embedding vector produced by an encoder.
pub type EmbeddingVector = Vec<f32>;

/// The independent model handles cached by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Text,
    Vision,
    Classifier,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Text => "text",
            ModelKind::Vision => "vision",
            ModelKind::Classifier => "classifier",
        };
        f.write_str(name)
    }
}

/// Score assigned to one candidate label by a zero-shot classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Encodes text into embeddings. Implementations block; the provider runs
/// them on the blocking pool.
pub trait TextEncoder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, AiError>;

    fn dimensions(&self) -> usize;
}

/// Encodes a pre-resized image into an embedding.
pub trait ImageEncoder: Send + Sync {
    fn embed(&self, image: &[u8]) -> Result<EmbeddingVector, AiError>;

    fn dimensions(&self) -> usize;
}

/// Scores an image against a set of textual labels.
///
/// Returns one score per label, in the same order as `labels`.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &[u8], labels: &[&str]) -> Result<Vec<LabelScore>, AiError>;
}

/// Creates model handles. Each method is called at most once per provider
/// and may take a long time (downloads, ONNX session setup).
pub trait ModelLoader: Send + Sync + 'static {
    fn load_text(&self) -> Result<Box<dyn TextEncoder>, AiError>;

    fn load_vision(&self) -> Result<Box<dyn ImageEncoder>, AiError>;

    fn load_classifier(&self) -> Result<Box<dyn ImageClassifier>, AiError>;
}

/// Discrete model lifecycle updates.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Started,
    Ready { dimensions: Option<usize> },
    Failed { reason: String },
}

/// Observer for model initialization progress.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, kind: ModelKind, event: &LoadEvent);
}

/// Writes load events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_event(&self, kind: ModelKind, event: &LoadEvent) {
        match event {
            LoadEvent::Started => {
                log::info!("initializing {kind} model (this may take a moment)")
            }
            LoadEvent::Ready {
                dimensions: Some(dims),
            } => log::info!("{kind} model ready ({dims} dimensions)"),
            LoadEvent::Ready { dimensions: None } => log::info!("{kind} model ready"),
            LoadEvent::Failed { reason } => {
                log::error!("failed to initialize {kind} model: {reason}")
            }
        }
    }
}
