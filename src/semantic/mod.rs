//! Semantic matching for lost-and-found posts.
//!
//! Generates text and image embeddings with fastembed, ranks posts by cosine
//! similarity, and tags photos with a zero-shot CLIP classifier.
//!
//! # Architecture
//!
//! - `cache`: Single-flight, fail-fast model handle cell
//! - `embeddings` / `vision`: fastembed model wrappers
//! - `loader`: Builds the fastembed models from configuration
//! - `provider`: Lazy model handles and deadline-bounded inference
//! - `similarity`: Cosine similarity and ranking
//! - `tagging`: Zero-shot image tags over a fixed label vocabulary
//! - `search`: Query-vs-candidates ranking with order-based fallback

mod cache;
pub mod embeddings;
mod errors;
pub mod labels;
mod loader;
pub mod models;
mod provider;
mod search;
pub mod similarity;
mod tagging;
pub mod vision;

pub use cache::ModelCell;
pub use errors::AiError;
pub use labels::{LabelVocabulary, TagLanguage, CANDIDATE_LABELS};
pub use loader::FastembedLoader;
pub use models::{
    EmbeddingVector, ImageClassifier, ImageEncoder, LabelScore, LoadEvent, LogProgress,
    ModelKind, ModelLoader, ProgressSink, TextEncoder,
};
pub use provider::EmbeddingProvider;
pub use search::{
    fallback_ranking, Candidate, RankingMode, SearchOptions, SearchOutcome, SemanticSearch,
};
pub use similarity::{cosine_similarity, ScoredMatch};
pub use tagging::{select_tags, ImageTagger, Tag, MAX_TAGS, TAG_MIN_SCORE};

/// Default text embedding model (384 dimensions)
pub const DEFAULT_TEXT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default vision model for image embeddings and tagging
pub const DEFAULT_VISION_MODEL: &str = "clip-vit-b-32";

/// Default minimum similarity for search matches
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Default maximum number of search matches
pub const DEFAULT_TOP_K: usize = 10;
