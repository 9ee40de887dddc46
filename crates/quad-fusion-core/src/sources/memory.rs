//! Episodic memory source adapter: namespace-scoped recall.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreResult;
use crate::sources::{SourceAdapter, SourceQuery};
use crate::traits::EpisodicStore;
use crate::types::{KnowledgeSource, SourceHit};

/// Adapter fronting the episodic memory store.
pub struct MemorySourceAdapter {
    store: Arc<dyn EpisodicStore>,
}

impl MemorySourceAdapter {
    /// Wrap an episodic store.
    pub fn new(store: Arc<dyn EpisodicStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourceAdapter for MemorySourceAdapter {
    fn source(&self) -> KnowledgeSource {
        KnowledgeSource::Memory
    }

    async fn query(&self, query: &SourceQuery) -> CoreResult<Vec<SourceHit>> {
        let episodes = self
            .store
            .recall(&query.memory_namespace, &query.text, query.limit)
            .await?;
        debug!(
            count = episodes.len(),
            namespace = %query.memory_namespace,
            "memory source answered"
        );

        Ok(episodes
            .into_iter()
            .map(|episode| {
                let namespace = episode.namespace.clone();
                SourceHit::new(episode.id, episode.relevance)
                    .with_metadata(serde_json::json!({ "namespace": namespace }))
            })
            .collect())
    }
}
