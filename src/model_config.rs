//! Per-model configuration: context-window widths and tokenizer mode.
//!
//! Each trained model directory may carry a `config.yaml` of flat
//! `key: value` lines. The file is read once per run and the resulting value
//! is passed down explicitly — no shared mutable state, so concurrent runs
//! against distinct corpora stay reentrant.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::corpus::token::Field;

/// How many neighboring word forms the tagger sees.
pub const DEFAULT_TAGGER_CONTEXT: usize = 2;

/// How many neighboring POS tags the lemmatizer sees.
pub const DEFAULT_LEMMATIZER_CONTEXT: usize = 1;

/// Character segmentation mode:
/// 0 = logo-syllabic (sign-per-unit), 1 = Sumerian (determinatives split
/// out), 2 = plain character sequence.
pub const DEFAULT_TOKENIZER: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelConfig {
    pub tagger_context: usize,
    pub lemmatizer_context: usize,
    pub tokenizer: u8,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tagger_context: DEFAULT_TAGGER_CONTEXT,
            lemmatizer_context: DEFAULT_LEMMATIZER_CONTEXT,
            tokenizer: DEFAULT_TOKENIZER,
        }
    }
}

impl ModelConfig {
    /// Read `<model_dir>/config.yaml`. A missing or unreadable file falls
    /// back to the documented defaults with a warning — models trained before
    /// configs existed still run.
    pub fn load(model_dir: &Path) -> Self {
        let path = model_dir.join("config.yaml");
        let config = match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    "model config not found, using default contexts and tokenizer"
                );
                Self::default()
            }
        };
        tracing::info!(
            tagger_context = config.tagger_context,
            lemmatizer_context = config.lemmatizer_context,
            tokenizer = config.tokenizer,
            "model configuration"
        );
        config
    }

    /// Parse flat `key: value` lines, whitespace-insensitive. Unknown keys
    /// and unparsable values are ignored, keeping the defaults.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let line: String = line.split_whitespace().collect();
            if let Some(value) = line.strip_prefix("tagger_context:") {
                if let Ok(n) = value.parse() {
                    config.tagger_context = n;
                }
            } else if let Some(value) = line.strip_prefix("lemmatizer_context:") {
                if let Ok(n) = value.parse() {
                    config.lemmatizer_context = n;
                }
            } else if let Some(value) = line.strip_prefix("tokenizer:") {
                if let Ok(n) = value.parse() {
                    config.tokenizer = n;
                }
            }
        }
        config
    }

    /// Context half-width used when recomputing a window over `field`:
    /// XPOS windows feed the lemmatizer, FORM windows feed the tagger.
    pub fn context_width(&self, field: Field) -> usize {
        match field {
            Field::Xpos => self.lemmatizer_context,
            _ => self.tagger_context,
        }
    }
}
