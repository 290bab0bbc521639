//! Vector similarity search over document chunks
//!
//! A [`VectorIndex`] owns the chunks of one document, one embedding per chunk
//! and the embedder that produced them, so queries are always embedded the same
//! way as the indexed text. Two strategies are available:
//!
//! - `Exact`: flat scan over every vector.
//! - `Approximate`: HNSW graph built with `instant-distance`.
//!
//! Both return results ordered by ascending distance, ties broken by chunk order.

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::ml::embedding::{Embedder, Embedding};
use crate::text::{Chunk, DocumentId};
use instant_distance::{Builder, HnswMap, Point, Search};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Distance metrics supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity)
    #[default]
    Cosine,
    /// Euclidean distance (L2)
    Euclidean,
    /// Negated dot product
    DotProduct,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
        }
    }

    /// Similarity score for a distance; larger is more similar
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
            DistanceMetric::DotProduct => -distance,
        }
    }
}

/// How the index answers queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Flat scan, always exact
    #[default]
    Exact,
    /// HNSW approximate nearest neighbours
    Approximate,
}

/// Vector search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    pub distance_metric: DistanceMetric,
    pub strategy: SearchStrategy,
    /// HNSW build-time candidate list size
    pub ef_construction: usize,
    /// HNSW query-time candidate list size
    pub ef_search: usize,
    /// HNSW layer assignment seed, fixed for reproducible graphs
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            distance_metric: DistanceMetric::Cosine,
            strategy: SearchStrategy::Exact,
            ef_construction: 100,
            ef_search: 50,
            seed: 42,
        }
    }
}

/// Memoization key of a built index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub document: DocumentId,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl IndexKey {
    pub fn new(document: &DocumentId, chunking: ChunkingConfig) -> Self {
        Self {
            document: document.clone(),
            chunk_size: chunking.chunk_size,
            overlap: chunking.overlap,
        }
    }
}

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Larger is more similar
    pub score: f32,
    /// Smaller is more similar
    pub distance: f32,
}

/// Point type for the HNSW graph
#[derive(Clone, Debug)]
pub struct VectorPoint {
    pub data: Embedding,
    pub distance_metric: DistanceMetric,
}

impl Point for VectorPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.distance_metric.distance(&self.data, &other.data)
    }
}

/// Embedded chunks of one document
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Embedding>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
    hnsw: Option<HnswMap<VectorPoint, usize>>,
}

impl VectorIndex {
    /// Embed every chunk through [`Embedder::embed_batch`] and build the search structure
    pub fn build(chunks: Vec<Chunk>, embedder: Arc<dyn Embedder>, config: &SearchConfig) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::Search("Cannot build an index without chunks".to_string()));
        }

        let dimension = embedder.dimension();
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "{} returned {} vectors for {} chunks",
                embedder.name(),
                vectors.len(),
                chunks.len()
            )));
        }
        for vector in &vectors {
            check_dimension(vector.len(), dimension)?;
        }

        let hnsw = match config.strategy {
            SearchStrategy::Exact => None,
            SearchStrategy::Approximate => {
                let points = vectors
                    .iter()
                    .map(|data| VectorPoint {
                        data: data.clone(),
                        distance_metric: config.distance_metric,
                    })
                    .collect();
                let ids = (0..vectors.len()).collect();
                let map = Builder::default()
                    .seed(config.seed)
                    .ef_construction(config.ef_construction)
                    .ef_search(config.ef_search)
                    .build(points, ids);
                Some(map)
            }
        };

        log::info!(
            "Indexed {} chunks with {} ({} dimensions, {:?} search)",
            chunks.len(),
            embedder.name(),
            dimension,
            config.strategy
        );

        Ok(Self {
            chunks,
            vectors,
            embedder,
            config: config.clone(),
            hnsw,
        })
    }

    /// Top `k` chunks for `query`, most similar first
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let query = self.embedder.embed(query)?;
        self.search_vector(&query, k)
    }

    /// Top `k` chunks for an already embedded query
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_dimension(query.len(), self.dimension())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let metric = self.config.distance_metric;
        let mut hits: Vec<(usize, f32)> = match &self.hnsw {
            None => self
                .vectors
                .iter()
                .enumerate()
                .map(|(id, vector)| (id, metric.distance(query, vector)))
                .collect(),
            Some(map) => {
                let point = VectorPoint {
                    data: query.to_vec(),
                    distance_metric: metric,
                };
                let mut search = Search::default();
                map.search(&point, &mut search)
                    .map(|item| (*item.value, item.distance))
                    .collect()
            }
        };

        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(id, distance)| ScoredChunk {
                chunk: self.chunks[id].clone(),
                score: metric.score(distance),
                distance,
            })
            .collect())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

fn check_dimension(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(RagError::Search(format!(
            "Vector dimension {} doesn't match index dimension {}",
            actual, expected
        )));
    }
    Ok(())
}

/// Cosine distance; zero vectors are maximally distant
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        1.0
    } else {
        1.0 - dot_product(a, b) / (norm_a * norm_b)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::embedding::HashingEmbedder;
    use approx::assert_relative_eq;

    /// Maps fixed words to axis vectors
    struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        fn embed(&self, text: &str) -> Result<Embedding> {
            Ok(match text {
                "x" => vec![1.0, 0.0, 0.0],
                "y" => vec![0.0, 1.0, 0.0],
                "z" => vec![0.0, 0.0, 1.0],
                "xy" => vec![0.9, 0.1, 0.0],
                "bad" => vec![1.0],
                _ => vec![1.0, 1.0, 1.0],
            })
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(id, text)| Chunk {
                id,
                text: text.to_string(),
                source: None,
                offset: 0,
                length: text.len(),
            })
            .collect()
    }

    #[test]
    fn test_distance_metrics() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];

        assert_relative_eq!(cosine_distance(&a, &b), 1.0, epsilon = 1e-6);
        assert_relative_eq!(cosine_distance(&a, &a), 0.0, epsilon = 1e-6);
        assert_relative_eq!(euclidean_distance(&a, &b), 2.0_f32.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(dot_product(&a, &b), 0.0, epsilon = 1e-6);
        assert_relative_eq!(cosine_distance(&a, &[0.0, 0.0, 0.0]), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_exact_search_orders_by_distance() {
        let index = VectorIndex::build(chunks(&["x", "y", "z"]), Arc::new(AxisEmbedder), &SearchConfig::default()).unwrap();

        let results = index.search("xy", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "x");
        assert_eq!(results[1].chunk.text, "y");
        assert!(results[0].score >= results[1].score);
        assert!(results[0].distance <= results[1].distance);
    }

    #[test]
    fn test_ties_broken_by_chunk_order() {
        let index = VectorIndex::build(chunks(&["y", "x", "x"]), Arc::new(AxisEmbedder), &SearchConfig::default()).unwrap();

        let results = index.search("x", 3).unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = VectorIndex::build(chunks(&["x", "y"]), Arc::new(AxisEmbedder), &SearchConfig::default()).unwrap();
        assert_eq!(index.search("z", 10).unwrap().len(), 2);
        assert!(index.search("z", 0).unwrap().is_empty());
    }

    /// Drops the last text of every batch
    struct ShortBatchEmbedder;

    impl Embedder for ShortBatchEmbedder {
        fn embed(&self, text: &str) -> Result<Embedding> {
            AxisEmbedder.embed(text)
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "short-batch"
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
            texts[..texts.len() - 1].iter().map(|text| self.embed(text)).collect()
        }
    }

    #[test]
    fn test_build_embeds_through_batches() {
        let result = VectorIndex::build(chunks(&["x", "y"]), Arc::new(ShortBatchEmbedder), &SearchConfig::default());
        assert!(matches!(result, Err(RagError::Embedding(_))));
    }

    #[test]
    fn test_empty_chunks_rejected() {
        let result = VectorIndex::build(Vec::new(), Arc::new(AxisEmbedder), &SearchConfig::default());
        assert!(matches!(result, Err(RagError::Search(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = VectorIndex::build(chunks(&["x", "bad"]), Arc::new(AxisEmbedder), &SearchConfig::default());
        assert!(matches!(result, Err(RagError::Search(_))));

        let index = VectorIndex::build(chunks(&["x"]), Arc::new(AxisEmbedder), &SearchConfig::default()).unwrap();
        assert!(matches!(index.search("bad", 1), Err(RagError::Search(_))));
    }

    #[test]
    fn test_euclidean_and_dot_product_metrics() {
        for metric in [DistanceMetric::Euclidean, DistanceMetric::DotProduct] {
            let config = SearchConfig {
                distance_metric: metric,
                ..Default::default()
            };
            let index = VectorIndex::build(chunks(&["z", "x", "y"]), Arc::new(AxisEmbedder), &config).unwrap();
            let results = index.search("xy", 1).unwrap();
            assert_eq!(results[0].chunk.text, "x", "metric {:?}", metric);
        }
    }

    #[test]
    fn test_approximate_matches_exact_on_small_index() {
        let texts = [
            "annual leave is twenty five days",
            "remote work requires manager approval",
            "passwords must be rotated every ninety days",
            "sick leave requires a doctor's note after three days",
            "company laptops must use disk encryption",
        ];
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(256));

        let exact = VectorIndex::build(chunks(&texts), Arc::clone(&embedder), &SearchConfig::default()).unwrap();
        let approximate = VectorIndex::build(
            chunks(&texts),
            embedder,
            &SearchConfig {
                strategy: SearchStrategy::Approximate,
                ..Default::default()
            },
        )
        .unwrap();

        let query = "how many days of annual leave";
        let exact_results = exact.search(query, 3).unwrap();
        let approx_results = approximate.search(query, 3).unwrap();

        assert_eq!(approx_results.len(), 3);
        assert_eq!(exact_results[0].chunk.id, approx_results[0].chunk.id);
        for pair in approx_results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_search_config_deserializes() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"strategy": "approximate", "distance_metric": "euclidean"}"#).unwrap();
        assert_eq!(config.strategy, SearchStrategy::Approximate);
        assert_eq!(config.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(config.top_k, 3);
    }
}
