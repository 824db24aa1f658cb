use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::semantic::embeddings::TextModel;
use crate::semantic::labels::TagLanguage;
use crate::semantic::vision::parse_vision_model_name;
use crate::semantic::{
    DEFAULT_TEXT_MODEL, DEFAULT_THRESHOLD, DEFAULT_TOP_K, DEFAULT_VISION_MODEL,
};

const CONFIG_FILE: &str = "config.yaml";

/// Default deadline for a text embedding call in seconds
const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 30;
/// Default deadline for an image embedding call in seconds
const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 60;
/// Default deadline for image tagging in seconds
const DEFAULT_TAG_TIMEOUT_SECS: u64 = 30;

/// Configuration for the semantic matching models
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Text embedding model (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Vision model used for image embeddings and tagging
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Prefer the quantized variant of the text model when one exists
    #[serde(default = "default_true")]
    pub quantized: bool,

    /// Model cache directory; defaults to `<base>/models`
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Show download progress bars on first model load
    #[serde(default = "default_true")]
    pub show_download_progress: bool,

    /// Alternative Hugging Face endpoint to download models from
    #[serde(default)]
    pub hf_endpoint: Option<String>,

    /// Deadline for text embedding calls in seconds
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Deadline for image embedding calls in seconds
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,

    /// Deadline for image tagging in seconds
    #[serde(default = "default_tag_timeout_secs")]
    pub tag_timeout_secs: u64,

    /// Minimum similarity for search matches [-1.0, 1.0]
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    /// Maximum number of search matches
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Language tags are reported in
    #[serde(default)]
    pub tag_language: TagLanguage,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            quantized: true,
            cache_dir: None,
            show_download_progress: true,
            hf_endpoint: None,
            embed_timeout_secs: DEFAULT_EMBED_TIMEOUT_SECS,
            image_timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
            tag_timeout_secs: DEFAULT_TAG_TIMEOUT_SECS,
            default_threshold: DEFAULT_THRESHOLD,
            default_top_k: DEFAULT_TOP_K,
            tag_language: TagLanguage::default(),
        }
    }
}

impl SemanticConfig {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn tag_timeout(&self) -> Duration {
        Duration::from_secs(self.tag_timeout_secs)
    }

    fn validate(&self) -> anyhow::Result<()> {
        TextModel::parse_model_name(&self.text_model)?;
        parse_vision_model_name(&self.vision_model)?;

        if !(-1.0..=1.0).contains(&self.default_threshold) {
            bail!(
                "semantic.default_threshold must be between -1.0 and 1.0, got {}",
                self.default_threshold
            );
        }
        if self.default_top_k == 0 {
            bail!("semantic.default_top_k must be greater than 0");
        }
        for (name, secs) in [
            ("embed_timeout_secs", self.embed_timeout_secs),
            ("image_timeout_secs", self.image_timeout_secs),
            ("tag_timeout_secs", self.tag_timeout_secs),
        ] {
            if secs == 0 {
                bail!("semantic.{name} must be greater than 0");
            }
        }
        Ok(())
    }
}

fn default_text_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_embed_timeout_secs() -> u64 {
    DEFAULT_EMBED_TIMEOUT_SECS
}

fn default_image_timeout_secs() -> u64 {
    DEFAULT_IMAGE_TIMEOUT_SECS
}

fn default_tag_timeout_secs() -> u64 {
    DEFAULT_TAG_TIMEOUT_SECS
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    /// Default data directory, `~/.local/share/lostfound`.
    pub fn default_base_path() -> anyhow::Result<PathBuf> {
        let home = homedir::my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/lostfound"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(Self::default_base_path()?)
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if it
    /// does not exist.
    pub fn load_with(base_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let base_path = base_path.as_ref();
        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            std::fs::create_dir_all(base_path)
                .with_context(|| format!("failed to create {}", base_path.display()))?;
            let default = serde_yml::to_string(&Self::default())?;
            std::fs::write(&config_path, default)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();
        config.semantic.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        let config_path = self.base_path.join(CONFIG_FILE);
        std::fs::write(&config_path, config_str)
            .with_context(|| format!("failed to write {}", config_path.display()))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory models are downloaded into.
    pub fn models_dir(&self) -> PathBuf {
        self.semantic
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.base_path.join("models"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(config.semantic, SemanticConfig::default());
        assert_eq!(config.base_path(), tmp.path());
        assert_eq!(config.models_dir(), tmp.path().join("models"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic:\n  default_threshold: 0.5\n  tag_language: zh\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert!((config.semantic.default_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.semantic.tag_language, TagLanguage::Zh);
        assert_eq!(config.semantic.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.semantic.image_timeout(), Duration::from_secs(60));

        // normalised file is written back
        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("embed_timeout_secs"));
    }

    #[test]
    fn test_custom_cache_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic:\n  cache_dir: /var/cache/lostfound\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert_eq!(config.models_dir(), PathBuf::from("/var/cache/lostfound"));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic:\n  default_threshold: 1.5\n",
        )
        .unwrap();

        let err = Config::load_with(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("default_threshold"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic:\n  tag_timeout_secs: 0\n",
        )
        .unwrap();

        let err = Config::load_with(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("tag_timeout_secs"));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic:\n  vision_model: resnet50\n",
        )
        .unwrap();

        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn test_malformed_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "semantic: [not, a, map]\n").unwrap();

        let err = Config::load_with(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
