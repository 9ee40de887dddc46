//! Source adapters: the uniform query contract over four heterogeneous
//! backends.
//!
//! Each adapter is a stateless wrapper translating one [`SourceQuery`]
//! into its backend's native call and the backend's native scores into
//! [`SourceHit`]s. Adapters know nothing about each other, timeouts, or
//! fusion; a failing adapter simply returns an error and the orchestrator
//! decides what that means for the query.

mod graph;
mod memory;
mod pattern;
mod vector;

pub use graph::GraphSourceAdapter;
pub use memory::MemorySourceAdapter;
pub use pattern::PatternSourceAdapter;
pub use vector::VectorSourceAdapter;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{KnowledgeSource, SourceHit};

/// Everything an adapter may need for one query.
///
/// Built once per search from the merged options; adapters read only the
/// fields that concern them.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    /// Raw query text.
    pub text: String,
    /// Caller-supplied embedding, if any; the vector adapter embeds the
    /// text itself otherwise.
    pub embedding: Option<Vec<f32>>,
    /// Per-source result cap.
    pub limit: usize,
    /// Graph traversal depth in hops.
    pub graph_depth: usize,
    /// Episodic namespace.
    pub memory_namespace: String,
    /// Minimum pattern confidence.
    pub min_pattern_confidence: f32,
}

/// Uniform adapter contract consumed by the orchestrator.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which of the four sources this adapter fronts.
    fn source(&self) -> KnowledgeSource;

    /// Answer one query with raw, source-scored hits.
    ///
    /// Errors are ordinary [`CoreError`](crate::CoreError)s; the
    /// orchestrator records them per source and keeps going.
    async fn query(&self, query: &SourceQuery) -> CoreResult<Vec<SourceHit>>;
}
