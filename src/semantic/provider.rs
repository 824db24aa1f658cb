//! Embedding provider: lazily loaded model handles plus deadline-bounded
//! inference.
//!
//! - One cached handle per [`ModelKind`], loaded single-flight on first use
//! - A failed load is remembered and every later call fails fast
//! - Every call runs under a deadline; on expiry the blocking inference is
//!   left to finish in the background and its result is dropped

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::cache::ModelCell;
use super::errors::AiError;
use super::models::{
    EmbeddingVector, ImageClassifier, ImageEncoder, LabelScore, LoadEvent, LogProgress,
    ModelKind, ModelLoader, ProgressSink, TextEncoder,
};
use super::similarity::l2_normalize;

pub struct EmbeddingProvider {
    loader: Arc<dyn ModelLoader>,
    progress: Arc<dyn ProgressSink>,
    timeout: Duration,
    image_timeout: Duration,
    text: ModelCell<dyn TextEncoder>,
    vision: ModelCell<dyn ImageEncoder>,
    classifier: ModelCell<dyn ImageClassifier>,
}

impl EmbeddingProvider {
    /// Create a provider. No model is loaded until first use.
    ///
    /// # Arguments
    /// * `loader` - Creates the model handles
    /// * `timeout` - Default deadline for each embedding call. Image calls
    ///   use it too unless [`with_image_timeout`](Self::with_image_timeout)
    ///   sets their own.
    pub fn new(loader: Arc<dyn ModelLoader>, timeout: Duration) -> Self {
        Self {
            loader,
            progress: Arc::new(LogProgress),
            timeout,
            image_timeout: timeout,
            text: ModelCell::new(ModelKind::Text),
            vision: ModelCell::new(ModelKind::Vision),
            classifier: ModelCell::new(ModelKind::Classifier),
        }
    }

    /// Replace the default log-based progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Default deadline for image embedding calls.
    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn image_timeout(&self) -> Duration {
        self.image_timeout
    }

    pub fn is_ready(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::Text => self.text.is_ready(),
            ModelKind::Vision => self.vision.is_ready(),
            ModelKind::Classifier => self.classifier.is_ready(),
        }
    }

    /// The recorded initialization failure for `kind`, if its load failed.
    pub fn failure(&self, kind: ModelKind) -> Option<AiError> {
        match kind {
            ModelKind::Text => self.text.failure(),
            ModelKind::Vision => self.vision.failure(),
            ModelKind::Classifier => self.classifier.failure(),
        }
    }

    /// Load the model for `kind` now instead of on first use.
    pub async fn warm_up(&self, kind: ModelKind) -> Result<(), AiError> {
        match kind {
            ModelKind::Text => self.text_model().await.map(|_| ()),
            ModelKind::Vision => self.vision_model().await.map(|_| ()),
            ModelKind::Classifier => self.classifier_model().await.map(|_| ()),
        }
    }

    /// Embed a single text under the default deadline.
    pub async fn embed_text(&self, text: &str) -> Result<EmbeddingVector, AiError> {
        self.embed_text_within(text, self.timeout).await
    }

    pub async fn embed_text_within(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<EmbeddingVector, AiError> {
        let mut embeddings = self
            .embed_texts_within(vec![text.to_string()], timeout)
            .await?;
        embeddings
            .pop()
            .ok_or_else(|| AiError::inference("no embedding returned"))
    }

    /// Embed many texts in one inference call under the default deadline.
    pub async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<EmbeddingVector>, AiError> {
        self.embed_texts_within(texts, self.timeout).await
    }

    pub async fn embed_texts_within(
        &self,
        texts: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<EmbeddingVector>, AiError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        with_deadline(ModelKind::Text, timeout, async {
            let model = self.text_model().await?;
            let expected = texts.len();
            let mut embeddings = run_blocking(move || model.embed(&texts)).await?;

            if embeddings.len() != expected {
                return Err(AiError::inference(format!(
                    "expected {expected} embeddings, got {}",
                    embeddings.len()
                )));
            }
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
            Ok(embeddings)
        })
        .await
    }

    /// Embed a pre-resized image under the image deadline.
    pub async fn embed_image(&self, image: &[u8]) -> Result<EmbeddingVector, AiError> {
        self.embed_image_within(image, self.image_timeout).await
    }

    pub async fn embed_image_within(
        &self,
        image: &[u8],
        timeout: Duration,
    ) -> Result<EmbeddingVector, AiError> {
        let image = image.to_vec();
        with_deadline(ModelKind::Vision, timeout, async {
            let model = self.vision_model().await?;
            let mut embedding = run_blocking(move || model.embed(&image)).await?;
            l2_normalize(&mut embedding);
            Ok(embedding)
        })
        .await
    }

    /// Score an image against `labels`, one score per label in label order.
    pub async fn classify_image_within(
        &self,
        image: &[u8],
        labels: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<LabelScore>, AiError> {
        let image = image.to_vec();
        with_deadline(ModelKind::Classifier, timeout, async {
            let model = self.classifier_model().await?;
            run_blocking(move || {
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                model.classify(&image, &labels)
            })
            .await
        })
        .await
    }

    async fn text_model(&self) -> Result<Arc<dyn TextEncoder>, AiError> {
        let loader = Arc::clone(&self.loader);
        let progress = Arc::clone(&self.progress);
        self.text
            .get_or_load(move || {
                observed_load(progress.as_ref(), ModelKind::Text, || {
                    let model: Arc<dyn TextEncoder> = Arc::from(loader.load_text()?);
                    let dimensions = model.dimensions();
                    Ok((model, Some(dimensions)))
                })
            })
            .await
    }

    async fn vision_model(&self) -> Result<Arc<dyn ImageEncoder>, AiError> {
        let loader = Arc::clone(&self.loader);
        let progress = Arc::clone(&self.progress);
        self.vision
            .get_or_load(move || {
                observed_load(progress.as_ref(), ModelKind::Vision, || {
                    let model: Arc<dyn ImageEncoder> = Arc::from(loader.load_vision()?);
                    let dimensions = model.dimensions();
                    Ok((model, Some(dimensions)))
                })
            })
            .await
    }

    async fn classifier_model(&self) -> Result<Arc<dyn ImageClassifier>, AiError> {
        let loader = Arc::clone(&self.loader);
        let progress = Arc::clone(&self.progress);
        self.classifier
            .get_or_load(move || {
                observed_load(progress.as_ref(), ModelKind::Classifier, || {
                    let model: Arc<dyn ImageClassifier> = Arc::from(loader.load_classifier()?);
                    Ok((model, None))
                })
            })
            .await
    }
}

/// Run a load, reporting start and outcome to `progress`.
fn observed_load<T: ?Sized>(
    progress: &dyn ProgressSink,
    kind: ModelKind,
    load: impl FnOnce() -> Result<(Arc<T>, Option<usize>), AiError>,
) -> Result<Arc<T>, AiError> {
    progress.on_event(kind, &LoadEvent::Started);
    match load() {
        Ok((model, dimensions)) => {
            progress.on_event(kind, &LoadEvent::Ready { dimensions });
            Ok(model)
        }
        Err(err) => {
            progress.on_event(
                kind,
                &LoadEvent::Failed {
                    reason: err.to_string(),
                },
            );
            Err(err)
        }
    }
}

async fn run_blocking<R, F>(f: F) -> Result<R, AiError>
where
    F: FnOnce() -> Result<R, AiError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AiError::inference(format!("inference task failed: {e}")))?
}

async fn with_deadline<R>(
    kind: ModelKind,
    timeout: Duration,
    fut: impl Future<Output = Result<R, AiError>>,
) -> Result<R, AiError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("{kind} model call exceeded {}ms deadline", timeout.as_millis());
            Err(AiError::Timeout(timeout))
        }
    }
}
