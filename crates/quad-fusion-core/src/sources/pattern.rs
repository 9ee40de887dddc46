//! Pattern source adapter: learned-pattern lookup with a confidence floor.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreResult;
use crate::sources::{SourceAdapter, SourceQuery};
use crate::traits::PatternStore;
use crate::types::{KnowledgeSource, SourceHit};

/// Adapter fronting the learned-pattern store.
///
/// The store is asked for `min_pattern_confidence` up front and the
/// returned hits are filtered against the same floor, so a store that
/// ignores the argument cannot smuggle low-confidence patterns into
/// fusion.
pub struct PatternSourceAdapter {
    store: Arc<dyn PatternStore>,
}

impl PatternSourceAdapter {
    /// Wrap a pattern store.
    pub fn new(store: Arc<dyn PatternStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourceAdapter for PatternSourceAdapter {
    fn source(&self) -> KnowledgeSource {
        KnowledgeSource::Pattern
    }

    async fn query(&self, query: &SourceQuery) -> CoreResult<Vec<SourceHit>> {
        let min_confidence = query.min_pattern_confidence;
        let patterns = self
            .store
            .match_patterns(&query.text, min_confidence, query.limit)
            .await?;
        debug!(
            count = patterns.len(),
            min_confidence, "pattern source answered"
        );

        Ok(patterns
            .into_iter()
            .filter(|p| p.confidence >= min_confidence)
            .map(|p| {
                let confidence = p.confidence;
                SourceHit::new(p.id, confidence)
                    .with_metadata(serde_json::json!({ "confidence": confidence }))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PatternHit;

    /// Returns fixed patterns and ignores the confidence argument.
    struct LeakyStore;

    #[async_trait]
    impl PatternStore for LeakyStore {
        async fn match_patterns(
            &self,
            _query: &str,
            _min_confidence: f32,
            _limit: usize,
        ) -> CoreResult<Vec<PatternHit>> {
            Ok(vec![
                PatternHit {
                    id: "strong".to_string(),
                    confidence: 0.9,
                    metadata: serde_json::Value::Null,
                },
                PatternHit {
                    id: "weak".to_string(),
                    confidence: 0.1,
                    metadata: serde_json::Value::Null,
                },
            ])
        }
    }

    #[tokio::test]
    async fn test_confidence_floor_enforced_locally() {
        let adapter = PatternSourceAdapter::new(Arc::new(LeakyStore));
        let query = SourceQuery {
            text: "q".to_string(),
            embedding: None,
            limit: 10,
            graph_depth: 2,
            memory_namespace: "default".to_string(),
            min_pattern_confidence: 0.5,
        };
        let hits = adapter.query(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "strong");
        assert!(hits[0].metadata["confidence"].as_f64().unwrap() > 0.8);
    }
}
