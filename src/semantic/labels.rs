//! Fixed candidate label vocabulary for zero-shot tagging.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Labels offered to the classifier, in the order they are scored.
pub const CANDIDATE_LABELS: &[&str] = &[
    "wallet",
    "keys",
    "phone",
    "laptop",
    "backpack",
    "bag",
    "credit card",
    "id card",
    "passport",
    "umbrella",
    "jacket",
    "shoes",
    "glasses",
    "watch",
    "jewelry",
    "book",
    "water bottle",
    "headphones",
    // colors
    "black object",
    "white object",
    "blue object",
    "red object",
    "green object",
];

/// Disambiguation suffix attached to color labels so CLIP reads them as
/// objects rather than abstract colors.
pub const QUALIFIER_SUFFIX: &str = " object";

static ZH_DISPLAY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("wallet", "钱包"),
        ("keys", "钥匙"),
        ("phone", "手机"),
        ("laptop", "笔记本电脑"),
        ("backpack", "背包"),
        ("bag", "包"),
        ("credit card", "银行卡"),
        ("id card", "证件"),
        ("passport", "护照"),
        ("umbrella", "雨伞"),
        ("jacket", "外套"),
        ("shoes", "鞋子"),
        ("glasses", "眼镜"),
        ("watch", "手表"),
        ("jewelry", "首饰"),
        ("book", "书籍"),
        ("water bottle", "水杯"),
        ("headphones", "耳机"),
        ("black", "黑色"),
        ("white", "白色"),
        ("blue", "蓝色"),
        ("red", "红色"),
        ("green", "绿色"),
    ])
});

/// Language tags are reported in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagLanguage {
    #[default]
    En,
    Zh,
}

impl std::str::FromStr for TagLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(TagLanguage::En),
            "zh" => Ok(TagLanguage::Zh),
            other => Err(format!("unsupported tag language '{other}', expected en or zh")),
        }
    }
}

/// An ordered label set plus an optional display mapping.
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    display: HashMap<String, String>,
}

impl LabelVocabulary {
    pub fn new(labels: Vec<String>, display: HashMap<String, String>) -> Self {
        Self { labels, display }
    }

    /// The built-in lost-and-found vocabulary.
    pub fn lost_and_found(language: TagLanguage) -> Self {
        let labels = CANDIDATE_LABELS.iter().map(|l| l.to_string()).collect();
        let display = match language {
            TagLanguage::En => HashMap::new(),
            TagLanguage::Zh => ZH_DISPLAY
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        Self::new(labels, display)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Turn a raw classifier label into the tag shown to users.
    ///
    /// Unmapped labels pass through with only the qualifier removed.
    pub fn to_tag(&self, label: &str) -> String {
        let stripped = strip_qualifier(label);
        self.display
            .get(stripped)
            .cloned()
            .unwrap_or_else(|| stripped.to_string())
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::lost_and_found(TagLanguage::default())
    }
}

/// Remove the trailing disambiguation suffix, e.g. "black object" -> "black".
pub fn strip_qualifier(label: &str) -> &str {
    label.strip_suffix(QUALIFIER_SUFFIX).unwrap_or(label)
}
