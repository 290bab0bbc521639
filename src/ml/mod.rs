//! Machine learning capabilities for policy-rag-rs
//!
//! Embeddings (candle sentence-transformers or offline feature hashing), vector
//! search over embedded chunks, answer generation (hosted chat models or a local
//! T5), and the process-wide model registry.

pub mod device;
pub mod embedding;
pub mod generation;
pub mod models;
pub mod search;
pub mod t5;
pub mod text;

// Re-export main types and functions
pub use device::{DeviceInfo, DeviceType};
pub use embedding::{BertEmbedder, Embedder, Embedding, EmbeddingBackend, EmbeddingConfig, HashingEmbedder};
pub use generation::{ContextOnlyGenerator, GenerationConfig, Generator, OpenAiGenerator, Prompt};
pub use models::{build_embedder, build_generator, shared_embedder, shared_generator, GeneratorKind, ModelFiles};
pub use search::{DistanceMetric, IndexKey, ScoredChunk, SearchConfig, SearchStrategy, VectorIndex};
pub use t5::T5Generator;
pub use text::{TextProcessor, TokenizedText};
