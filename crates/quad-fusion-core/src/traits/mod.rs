//! Contracts at the external-collaborator boundary.
//!
//! The graph, episodic and pattern stores (and the query embedder) live
//! outside this crate; their persistence, update rules and query
//! understanding are explicitly out of scope here. These traits are the
//! exact surface the source adapters consume. In-memory reference
//! implementations for tests and demos live in [`crate::stubs`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::types::EntityId;

/// One node reached by a bounded graph traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphHop {
    /// Reached entity id.
    pub id: EntityId,
    /// Hop count from the nearest traversal seed (0 = seed itself).
    pub depth: usize,
    /// Store-specific payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One episode recalled from the episodic store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeHit {
    /// Episode id.
    pub id: EntityId,
    /// Store-native relevance, higher is better.
    pub relevance: f32,
    /// Namespace the episode was recalled from.
    pub namespace: String,
    /// Store-specific payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One learned pattern matched against a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHit {
    /// Pattern id.
    pub id: EntityId,
    /// Learned confidence in [0, 1]; the learning engine that produces
    /// these lives outside this crate.
    pub confidence: f32,
    /// Store-specific payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Graph traversal store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Traverse outward from the store's own seeds for `query`, up to
    /// `max_depth` hops, returning every reached node with its hop count.
    async fn neighborhood(&self, query: &str, max_depth: usize) -> CoreResult<Vec<GraphHop>>;
}

/// Episodic memory store.
#[async_trait]
pub trait EpisodicStore: Send + Sync {
    /// Recall up to `limit` episodes relevant to `query` within one
    /// namespace.
    async fn recall(
        &self,
        namespace: &str,
        query: &str,
        limit: usize,
    ) -> CoreResult<Vec<EpisodeHit>>;
}

/// Learned-pattern store.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Match up to `limit` patterns against `query`, dropping anything
    /// below `min_confidence`.
    async fn match_patterns(
        &self,
        query: &str,
        min_confidence: f32,
        limit: usize,
    ) -> CoreResult<Vec<PatternHit>>;
}

/// Query embedding provider.
///
/// The vector adapter calls this when the caller did not supply an
/// embedding alongside the query text.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Embed query text into the index's vector space.
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    /// Dimension of produced embeddings.
    fn dimension(&self) -> usize;
}
