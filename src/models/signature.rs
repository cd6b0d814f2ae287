//! Content signatures.

use serde::{Deserialize, Serialize};

/// How much the extractor trusts the region it hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// A named strategy matched a plausible region
    #[default]
    High,
    /// Nothing matched; the signature covers a prefix of the body text
    Fallback,
}

/// A value standing in for a page's content across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Hex digest of the non-volatile comparison text
    pub stable_id: String,

    /// Human-readable excerpt of the newest item, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,

    /// Counter value for count-based targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_count: Option<u64>,

    #[serde(default)]
    pub confidence: Confidence,

    /// Name of the strategy that produced the signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl Signature {
    pub fn new(stable_id: impl Into<String>) -> Self {
        Self {
            stable_id: stable_id.into(),
            preview: None,
            numeric_count: None,
            confidence: Confidence::High,
            strategy: None,
        }
    }

    pub fn with_preview(mut self, preview: Option<String>) -> Self {
        self.preview = preview.filter(|p| !p.is_empty());
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.numeric_count = Some(count);
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>, confidence: Confidence) -> Self {
        self.strategy = Some(strategy.into());
        self.confidence = confidence;
        self
    }

    /// Abbreviated stable id for log lines and messages.
    pub fn short_id(&self) -> &str {
        short_hash(&self.stable_id)
    }
}

/// First 12 characters of a hex digest.
pub fn short_hash(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
