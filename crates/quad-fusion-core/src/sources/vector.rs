//! Vector source adapter: fronts the HNSW index.
//!
//! The index is owned here exclusively, behind a reader-writer lock:
//! searches take the read side, structural operations (insert, delete,
//! rebuild) take the write side, so a traversal never observes a
//! half-updated adjacency list. Callers never touch the index directly.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::CoreResult;
use crate::index::{HnswConfig, HnswIndex, IndexSnapshot};
use crate::similarity::distance_to_score;
use crate::sources::{SourceAdapter, SourceQuery};
use crate::traits::QueryEmbedder;
use crate::types::{EntityId, KnowledgeSource, SourceHit};

/// Adapter fronting the vector similarity index.
pub struct VectorSourceAdapter {
    index: RwLock<HnswIndex>,
    embedder: Arc<dyn QueryEmbedder>,
}

impl VectorSourceAdapter {
    /// Wrap a fresh index with the given configuration.
    pub fn new(config: HnswConfig, embedder: Arc<dyn QueryEmbedder>) -> CoreResult<Self> {
        let index = HnswIndex::new(embedder.dimension(), config)?;
        Ok(Self {
            index: RwLock::new(index),
            embedder,
        })
    }

    /// Wrap an existing index (e.g. restored from a snapshot).
    pub fn with_index(index: HnswIndex, embedder: Arc<dyn QueryEmbedder>) -> Self {
        Self {
            index: RwLock::new(index),
            embedder,
        }
    }

    /// Insert a vector. Fails on dimension mismatch or duplicate id,
    /// leaving the index unchanged.
    pub fn insert(&self, id: impl Into<EntityId>, vector: Vec<f32>) -> CoreResult<()> {
        self.index.write().insert(id, vector)?;
        Ok(())
    }

    /// Insert a batch, all-or-nothing validation first.
    pub fn insert_batch(&self, entries: Vec<(EntityId, Vec<f32>)>) -> CoreResult<()> {
        self.index.write().insert_batch(entries)?;
        Ok(())
    }

    /// Delete an id. Fails when the id is unknown.
    pub fn delete(&self, id: &str) -> CoreResult<bool> {
        Ok(self.index.write().delete(id)?)
    }

    /// Rebuild the proximity graph from surviving vectors.
    pub fn rebuild(&self) -> CoreResult<()> {
        self.index.write().rebuild()?;
        Ok(())
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Emit a versioned snapshot of the index.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.index.read().serialize()
    }

    /// Approximate resident bytes of the underlying index.
    pub fn memory_usage(&self) -> usize {
        self.index.read().memory_usage()
    }
}

#[async_trait]
impl SourceAdapter for VectorSourceAdapter {
    fn source(&self) -> KnowledgeSource {
        KnowledgeSource::Vector
    }

    async fn query(&self, query: &SourceQuery) -> CoreResult<Vec<SourceHit>> {
        let embedding = match &query.embedding {
            Some(embedding) => embedding.clone(),
            None => self.embedder.embed(&query.text).await?,
        };

        // embedding happened outside the lock; the search itself is
        // synchronous, so the read guard never crosses an await point
        let index = self.index.read();
        let metric = index.config().metric;
        let hits = index.search(&embedding, query.limit, None)?;
        debug!(
            count = hits.len(),
            indexed = index.len(),
            "vector source answered"
        );

        Ok(hits
            .into_iter()
            .map(|hit| {
                let score = distance_to_score(hit.distance, metric);
                SourceHit::new(hit.id, score)
                    .with_metadata(serde_json::json!({ "distance": hit.distance }))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::HashingEmbedder;
    use crate::traits::QueryEmbedder as _;

    fn adapter() -> VectorSourceAdapter {
        let embedder = Arc::new(HashingEmbedder::new(16));
        VectorSourceAdapter::new(HnswConfig::default(), embedder).unwrap()
    }

    #[tokio::test]
    async fn test_query_with_explicit_embedding() {
        let adapter = adapter();
        adapter.insert("a", vec![1.0; 16]).unwrap();
        adapter.insert("b", vec![-1.0; 16]).unwrap();

        let query = SourceQuery {
            text: String::new(),
            embedding: Some(vec![1.0; 16]),
            limit: 1,
            graph_depth: 2,
            memory_namespace: "default".to_string(),
            min_pattern_confidence: 0.0,
        };
        let hits = adapter.query(&query).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].raw_score > 0.9);
    }

    #[tokio::test]
    async fn test_query_embeds_text_when_missing() {
        let adapter = adapter();
        // index the embedding the stub will produce for the same text
        let embedder = HashingEmbedder::new(16);
        let stored = embedder.embed("rust memory model").await.unwrap();
        adapter.insert("doc", stored).unwrap();

        let query = SourceQuery {
            text: "rust memory model".to_string(),
            embedding: None,
            limit: 1,
            graph_depth: 2,
            memory_namespace: "default".to_string(),
            min_pattern_confidence: 0.0,
        };
        let hits = adapter.query(&query).await.unwrap();
        assert_eq!(hits[0].id, "doc");
    }

    #[test]
    fn test_structural_ops_pass_through() {
        let adapter = adapter();
        adapter.insert("x", vec![0.5; 16]).unwrap();
        assert_eq!(adapter.len(), 1);
        assert!(adapter.delete("x").unwrap());
        assert!(adapter.is_empty());
        assert!(adapter.delete("x").is_err());
    }
}
