//! Text preprocessing and tokenization for the local models

use crate::error::{RagError, Result};
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};
use unicode_normalization::UnicodeNormalization;

/// Token ids ready for a forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizedText {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub token_type_ids: Vec<u32>,
}

impl TokenizedText {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Normalizes text and runs a HuggingFace tokenizer
pub struct TextProcessor {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TextProcessor {
    /// Wrap `tokenizer`, truncating encodings to `max_length` tokens and disabling padding
    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| RagError::TextProcessing(format!("Invalid truncation settings: {}", e)))?;
        tokenizer.with_padding(None);
        Ok(Self { tokenizer, max_length })
    }

    /// Load `tokenizer.json` from disk
    pub fn from_file<P: AsRef<Path>>(path: P, max_length: usize) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            RagError::Model(format!("Failed to load tokenizer from {}: {}", path.display(), e))
        })?;
        log::debug!("Loaded tokenizer from {}", path.display());
        Self::new(tokenizer, max_length)
    }

    /// NFC-normalize and collapse runs of whitespace
    pub fn preprocess_text(text: &str) -> String {
        text.nfc()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tokenize with special tokens
    pub fn tokenize(&self, text: &str) -> Result<TokenizedText> {
        let preprocessed = Self::preprocess_text(text);
        let encoding = self
            .tokenizer
            .encode(preprocessed, true)
            .map_err(|e| RagError::TextProcessing(format!("Tokenization failed: {}", e)))?;

        Ok(TokenizedText {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            token_type_ids: encoding.get_type_ids().to_vec(),
        })
    }

    /// Turn generated ids back into text, dropping special tokens
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(ids, true)
            .map_err(|e| RagError::TextProcessing(format!("Detokenization failed: {}", e)))?;
        Ok(text.trim().to_string())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}
