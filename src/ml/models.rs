//! Model registry
//!
//! Embedding and generation models are expensive to construct, so each is built
//! at most once per process and shared read-only afterwards. The first
//! configuration to reach a registry slot wins; later calls get the same model.

use crate::error::{RagError, Result};
use crate::ml::embedding::{BertEmbedder, Embedder, EmbeddingBackend, EmbeddingConfig, HashingEmbedder};
use crate::ml::generation::{ContextOnlyGenerator, GenerationConfig, Generator, OpenAiGenerator};
use crate::ml::t5::T5Generator;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

static EMBEDDER: OnceCell<Arc<dyn Embedder>> = OnceCell::const_new();
static GENERATOR: OnceCell<Arc<dyn Generator>> = OnceCell::const_new();

/// Local paths of a HuggingFace model's files
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Download (or reuse from the HuggingFace cache) the files of `model_id`
    pub fn fetch(model_id: &str, revision: &str) -> Result<Self> {
        log::info!("Resolving model '{}' ({}) from HuggingFace Hub", model_id, revision);

        let api = Api::new().map_err(|e| RagError::Model(format!("Failed to create HF API: {}", e)))?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let get = |file_name: &str| {
            repo.get(file_name).map_err(|e| {
                RagError::Model(format!("Failed to download {}/{}: {}", model_id, file_name, e))
            })
        };

        let files = Self {
            config: get("config.json")?,
            tokenizer: get("tokenizer.json")?,
            weights: get("model.safetensors")?,
        };
        log::debug!("Model files for '{}': {:?}", model_id, files);
        Ok(files)
    }
}

/// Construct a fresh embedder; blocking work runs off the async runtime
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Hashing => {
            log::info!("Using feature-hashing embeddings ({} dimensions)", config.hashing_dimension);
            Ok(Arc::new(HashingEmbedder::from_config(config)))
        }
        EmbeddingBackend::Bert => {
            let config = config.clone();
            let embedder = tokio::task::spawn_blocking(move || {
                let files = ModelFiles::fetch(&config.model_name, &config.revision)?;
                BertEmbedder::from_files(&files.config, &files.tokenizer, &files.weights, &config)
            })
            .await
            .map_err(|e| RagError::Embedding(format!("Model loading task failed: {}", e)))??;
            Ok(Arc::new(embedder))
        }
    }
}

/// Which generator a configuration asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Digest of the retrieved context, no model
    ContextOnly,
    /// OpenAI-compatible chat completion endpoint
    OpenAi,
    /// Local T5 model from the HuggingFace Hub
    LocalT5,
}

impl GeneratorKind {
    /// `offline` always wins; otherwise a configured endpoint is preferred over the local model
    pub fn select(config: &GenerationConfig, offline: bool) -> Self {
        if offline {
            GeneratorKind::ContextOnly
        } else if config.has_endpoint() {
            GeneratorKind::OpenAi
        } else {
            GeneratorKind::LocalT5
        }
    }
}

/// Construct a fresh generator
///
/// The choice is made once, here. A generator that fails at answer time is
/// never swapped for another one.
pub async fn build_generator(config: &GenerationConfig, offline: bool) -> Result<Arc<dyn Generator>> {
    match GeneratorKind::select(config, offline) {
        GeneratorKind::ContextOnly => {
            log::warn!("Offline mode, answering from the retrieved context only");
            Ok(Arc::new(ContextOnlyGenerator))
        }
        GeneratorKind::OpenAi => {
            match &config.base_url {
                Some(base_url) => log::info!("Using {} via {}", config.model, base_url),
                None => log::info!("Using OpenAI {}", config.model),
            }
            Ok(Arc::new(OpenAiGenerator::new(config.clone())))
        }
        GeneratorKind::LocalT5 => {
            log::info!("No LLM endpoint configured, using local model {}", config.local_model);
            let config = config.clone();
            let generator = tokio::task::spawn_blocking(move || {
                let files = ModelFiles::fetch(&config.local_model, &config.local_revision)?;
                T5Generator::from_files(&files.config, &files.tokenizer, &files.weights, &config)
            })
            .await
            .map_err(|e| RagError::Model(format!("Model loading task failed: {}", e)))??;
            Ok(Arc::new(generator))
        }
    }
}

/// The process-wide embedder, built on first use
pub async fn shared_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    EMBEDDER
        .get_or_try_init(|| build_embedder(config))
        .await
        .map(Arc::clone)
}

/// The process-wide generator, built on first use
pub async fn shared_generator(config: &GenerationConfig, offline: bool) -> Result<Arc<dyn Generator>> {
    GENERATOR
        .get_or_try_init(|| build_generator(config, offline))
        .await
        .map(Arc::clone)
}
