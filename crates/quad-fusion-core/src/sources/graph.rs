//! Graph source adapter: bounded traversal with hop decay.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreResult;
use crate::sources::{SourceAdapter, SourceQuery};
use crate::traits::GraphStore;
use crate::types::{KnowledgeSource, SourceHit};

/// Per-hop score decay factor: a node at depth `d` scores `0.7^d`.
const HOP_DECAY: f32 = 0.7;

/// Adapter fronting the graph traversal store.
pub struct GraphSourceAdapter {
    store: Arc<dyn GraphStore>,
}

impl GraphSourceAdapter {
    /// Wrap a graph store.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourceAdapter for GraphSourceAdapter {
    fn source(&self) -> KnowledgeSource {
        KnowledgeSource::Graph
    }

    async fn query(&self, query: &SourceQuery) -> CoreResult<Vec<SourceHit>> {
        let hops = self
            .store
            .neighborhood(&query.text, query.graph_depth)
            .await?;
        debug!(count = hops.len(), depth = query.graph_depth, "graph source answered");

        let mut hits: Vec<SourceHit> = hops
            .into_iter()
            .map(|hop| {
                let score = HOP_DECAY.powi(hop.depth as i32);
                SourceHit::new(hop.id, score)
                    .with_metadata(serde_json::json!({ "depth": hop.depth }))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(query.limit);
        Ok(hits)
    }
}
