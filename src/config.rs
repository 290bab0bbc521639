//! Configuration for policy-rag-rs
//!
//! Every stage of the pipeline owns a small serde-friendly config struct with a
//! `Default` impl. [`Config`] aggregates them and can be loaded from a JSON file
//! in which any section or field may be omitted.

use crate::error::{RagError, Result};
use crate::ml::{EmbeddingConfig, GenerationConfig, SearchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Names of the bundled sample policies used when no document was supplied
pub const DEFAULT_CORPUS_FILES: [&str; 3] = [
    "hr_leave_policy.txt",
    "it_acceptable_use_policy.txt",
    "remote_work_policy.txt",
];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub generation: GenerationConfig,
    pub fetch: FetchConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

/// Chunking parameters, measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters repeated at the start of the following chunk
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Check the chunker precondition `overlap < chunk_size`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Web page fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            user_agent: concat!("policy-rag-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Session display and default corpus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of history entries shown
    pub history_display: usize,
    /// Characters of each answer shown in the history view
    pub answer_preview_chars: usize,
    /// Characters of each retrieved chunk shown as a source excerpt
    pub excerpt_chars: usize,
    /// Directory searched for the default corpus
    pub corpus_dir: PathBuf,
    /// File names of the default corpus, concatenated in order
    pub corpus_files: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_display: 10,
            answer_preview_chars: 120,
            excerpt_chars: 600,
            corpus_dir: PathBuf::from("."),
            corpus_files: DEFAULT_CORPUS_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Capacities of the memoization caches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub extraction_entries: usize,
    pub chunk_entries: usize,
    pub index_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            extraction_entries: 16,
            chunk_entries: 16,
            index_entries: 4,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `POLICY_RAG_*` / `OPENAI_API_KEY` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("POLICY_RAG_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            if !key.is_empty() {
                self.generation.api_key = Some(key);
            }
        }
        if let Ok(base_url) = std::env::var("POLICY_RAG_BASE_URL") {
            if !base_url.is_empty() {
                self.generation.base_url = Some(base_url);
            }
        }
        if let Ok(model) = std::env::var("POLICY_RAG_MODEL") {
            if !model.is_empty() {
                self.generation.model = model;
            }
        }
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.search.top_k == 0 {
            return Err(RagError::Config("search.top_k must be at least 1".to_string()));
        }
        if self.generation.max_tokens == 0 {
            return Err(RagError::Config("generation.max_tokens must be at least 1".to_string()));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(RagError::Config("fetch.timeout_ms must be at least 1".to_string()));
        }
        if self.cache.extraction_entries == 0 || self.cache.chunk_entries == 0 || self.cache.index_entries == 0 {
            return Err(RagError::Config("cache capacities must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(15));
        assert_eq!(config.session.history_display, 10);
        assert_eq!(config.session.corpus_files.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let chunking = ChunkingConfig { chunk_size: 100, overlap: 100 };
        assert!(matches!(chunking.validate(), Err(RagError::Config(_))));

        let chunking = ChunkingConfig { chunk_size: 0, overlap: 0 };
        assert!(chunking.validate().is_err());

        let chunking = ChunkingConfig { chunk_size: 3, overlap: 0 };
        assert!(chunking.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunking": {{"chunk_size": 500}}, "search": {{"top_k": 5}}}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.session.excerpt_chars, 600);
    }
}
