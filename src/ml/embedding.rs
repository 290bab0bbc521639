//! Sentence embeddings
//!
//! [`Embedder`] is the seam between the vector index and whatever produces the
//! vectors. Two implementations ship with the crate:
//!
//! - [`BertEmbedder`]: a sentence-transformer (default `all-MiniLM-L6-v2`)
//!   run locally with candle. Token embeddings are mean-pooled and
//!   L2-normalized.
//! - [`HashingEmbedder`]: signed feature hashing of lowercased words. Needs no
//!   model download, which makes it the choice for offline runs and tests.

use crate::error::{RagError, Result};
use crate::ml::device::{self, DeviceType};
use crate::ml::text::TextProcessor;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{self, BertModel};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Produces fixed-dimension vectors from text
///
/// Implementations are shared read-only across the process, so `embed` takes
/// `&self` and must be deterministic for a given input.
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Length of every vector returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;

    /// Short human-readable model name
    fn name(&self) -> &str;

    /// Embed several texts in order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Which embedding implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Sentence-transformer weights from the HuggingFace Hub
    #[default]
    Bert,
    /// Offline feature hashing
    Hashing,
}

/// Configuration for the embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// HuggingFace Hub repository of the sentence-transformer
    pub model_name: String,
    /// Hub revision (branch, tag or commit)
    pub revision: String,
    /// Maximum sequence length in tokens
    pub max_length: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Device to use for inference
    pub device_type: DeviceType,
    /// Vector length of the hashing backend
    pub hashing_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Bert,
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            revision: "main".to_string(),
            max_length: 256,
            normalize: true,
            device_type: DeviceType::Auto,
            hashing_dimension: 384,
        }
    }
}

/// Sentence-transformer running on candle
pub struct BertEmbedder {
    model: BertModel,
    processor: TextProcessor,
    device: Device,
    dimension: usize,
    normalize: bool,
    name: String,
}

impl BertEmbedder {
    /// Load model weights, config and tokenizer from local files
    pub fn from_files(
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        config: &EmbeddingConfig,
    ) -> Result<Self> {
        let device = device::device_for(config.device_type);
        log::info!("Loading {} on {}", config.model_name, device.name);

        let bert_config: bert::Config = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], bert::DTYPE, &device.device)?
        };
        let model = BertModel::load(vb, &bert_config)?;
        let processor = TextProcessor::from_file(tokenizer_path, config.max_length)?;

        Ok(Self {
            model,
            processor,
            device: device.device,
            dimension: bert_config.hidden_size,
            normalize: config.normalize,
            name: config.model_name.clone(),
        })
    }

    fn forward(&self, text: &str) -> Result<Tensor> {
        let tokens = self.processor.tokenize(text)?;
        let input_ids = Tensor::new(tokens.input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(tokens.attention_mask.as_slice(), &self.device)?.unsqueeze(0)?;

        // (1, n_tokens, hidden)
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over non-padding tokens
        let mask = attention_mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        if self.normalize {
            let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
            Ok(pooled.broadcast_div(&norm)?)
        } else {
            Ok(pooled)
        }
    }
}

impl Embedder for BertEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let pooled = self
            .forward(text)
            .map_err(|e| RagError::Embedding(format!("{} failed to embed text: {}", self.name, e)))?;
        Ok(pooled.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Deterministic bag-of-words embedding via signed feature hashing
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    normalize: bool,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            normalize: true,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            dimension: config.hashing_dimension.max(1),
            normalize: config.normalize,
        }
    }

    fn bucket(&self, word: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        let hash = hasher.finish();
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut embedding = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let (index, sign) = self.bucket(word);
            embedding[index] += sign;
        }

        if self.normalize {
            normalize_in_place(&mut embedding);
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "feature-hashing"
    }
}

/// Scale `vector` to unit length; zero vectors are left unchanged
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
