//! Unified search orchestrator: fan-out, race, fan-in, fuse.
//!
//! One query becomes four concurrent adapter calls, each raced against
//! the per-source timeout. The orchestrator is a fan-out/fan-in barrier:
//! it waits for all four outcomes (success, timeout, or error) before
//! fusing whatever survived. Overall latency is bounded by the slowest
//! single source, not the sum.
//!
//! A timeout loser's future is dropped at the race boundary, so adapter
//! work stops at its next await point rather than running detached;
//! store implementations are expected to be cancel-safe.
//!
//! Source failures are local: they land in that source's stats entry and
//! the query continues. Only zero usable sources fails the query, with
//! [`CoreError::AllSourcesFailed`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::{FusionOptions, FusionOptionsPatch, FusionWeightsPatch};
use crate::error::{CoreError, CoreResult};
use crate::fusion::fuse;
use crate::similarity::timed;
use crate::sources::{SourceAdapter, SourceQuery};
use crate::types::{
    KnowledgeSource, SearchMetadata, SearchResponse, SourceHit, SourceStats,
};

/// Lifetime counters for one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Queries that ran to completion (including `AllSourcesFailed`).
    pub queries_executed: u64,
    /// Fused results returned across all queries.
    pub results_returned: u64,
    /// Individual source timeouts across all queries.
    pub source_timeouts: u64,
    /// Individual source errors across all queries.
    pub source_errors: u64,
    /// Cumulative end-to-end query latency in milliseconds.
    pub total_duration_ms: u64,
}

/// Orchestrates the four source adapters behind the unified search
/// boundary.
///
/// Configuration (weights, caps, namespace) is per-instance state guarded
/// by a lock, never module-level globals: concurrent orchestrators stay
/// isolated, and weight updates live only as long as the instance.
pub struct UnifiedSearchOrchestrator {
    vector: Arc<dyn SourceAdapter>,
    graph: Arc<dyn SourceAdapter>,
    memory: Arc<dyn SourceAdapter>,
    pattern: Arc<dyn SourceAdapter>,
    options: RwLock<FusionOptions>,
    queries_executed: AtomicU64,
    results_returned: AtomicU64,
    source_timeouts: AtomicU64,
    source_errors: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl UnifiedSearchOrchestrator {
    /// Build an orchestrator over the four adapters with default options.
    pub fn new(
        vector: Arc<dyn SourceAdapter>,
        graph: Arc<dyn SourceAdapter>,
        memory: Arc<dyn SourceAdapter>,
        pattern: Arc<dyn SourceAdapter>,
    ) -> Self {
        Self::with_options(vector, graph, memory, pattern, FusionOptions::default())
    }

    /// Build an orchestrator with explicit default options.
    pub fn with_options(
        vector: Arc<dyn SourceAdapter>,
        graph: Arc<dyn SourceAdapter>,
        memory: Arc<dyn SourceAdapter>,
        pattern: Arc<dyn SourceAdapter>,
        options: FusionOptions,
    ) -> Self {
        Self {
            vector,
            graph,
            memory,
            pattern,
            options: RwLock::new(options),
            queries_executed: AtomicU64::new(0),
            results_returned: AtomicU64::new(0),
            source_timeouts: AtomicU64::new(0),
            source_errors: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
        }
    }

    /// Current default options.
    pub fn options(&self) -> FusionOptions {
        self.options.read().clone()
    }

    /// Update the instance's default weights.
    ///
    /// The patch is applied over the current weights, validated, and kept
    /// for the life of this orchestrator; nothing is persisted.
    pub fn update_weights(&self, patch: FusionWeightsPatch) -> CoreResult<()> {
        let mut guard = self.options.write();
        let merged = patch.apply(guard.weights);
        merged.validate()?;
        guard.weights = merged;
        debug!(?merged, "weights updated");
        Ok(())
    }

    /// Lifetime counters for this instance.
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            results_returned: self.results_returned.load(Ordering::Relaxed),
            source_timeouts: self.source_timeouts.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
        }
    }

    /// Run one unified search.
    ///
    /// Validates and merges options, fans out to all four sources under
    /// independent timeouts, waits for every outcome, and fuses the
    /// survivors.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] before any source is queried, when the
    ///   merged options violate a cap or the weights are degenerate
    /// - [`CoreError::AllSourcesFailed`] when zero sources produced a
    ///   usable result set
    #[instrument(skip(self, embedding, patch), fields(query = %query))]
    pub async fn search(
        &self,
        query: &str,
        embedding: Option<Vec<f32>>,
        patch: Option<FusionOptionsPatch>,
    ) -> CoreResult<SearchResponse> {
        let defaults = self.options.read().clone();
        let options = match patch {
            Some(patch) => patch.merge_over(&defaults),
            None => defaults,
        };
        options.validate()?;

        let started = Instant::now();
        let timeout = Duration::from_millis(options.source_timeout_ms);
        let source_query = SourceQuery {
            text: query.to_string(),
            embedding,
            limit: options.top_k,
            graph_depth: options.graph_depth,
            memory_namespace: options.memory_namespace.clone(),
            min_pattern_confidence: options.min_pattern_confidence,
        };

        // fan-out: four racing tasks; fan-in: wait for every outcome
        let (vector, graph, memory, pattern) = tokio::join!(
            race_source(&self.vector, &source_query, timeout),
            race_source(&self.graph, &source_query, timeout),
            race_source(&self.memory, &source_query, timeout),
            race_source(&self.pattern, &source_query, timeout),
        );

        let mut source_stats: BTreeMap<KnowledgeSource, SourceStats> = BTreeMap::new();
        let mut surviving: Vec<(KnowledgeSource, Vec<SourceHit>)> = Vec::with_capacity(4);
        for (source, stats, hits) in [vector, graph, memory, pattern] {
            if stats.timed_out {
                self.source_timeouts.fetch_add(1, Ordering::Relaxed);
            }
            if stats.error.is_some() {
                self.source_errors.fetch_add(1, Ordering::Relaxed);
            }
            if let Some(hits) = hits {
                surviving.push((source, hits));
            }
            source_stats.insert(source, stats);
        }

        let sources_queried = KnowledgeSource::ALL.len();
        let sources_responded = surviving.len();
        let total_duration_ms = started.elapsed().as_millis() as u64;

        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(total_duration_ms, Ordering::Relaxed);

        if surviving.is_empty() {
            warn!(sources_queried, "every source failed or timed out");
            return Err(CoreError::AllSourcesFailed {
                attempted: sources_queried,
            });
        }

        let results = fuse(surviving, &options.weights, options.top_k);
        self.results_returned
            .fetch_add(results.len() as u64, Ordering::Relaxed);

        debug!(
            results = results.len(),
            sources_responded,
            total_duration_ms,
            "unified search complete"
        );

        Ok(SearchResponse {
            results,
            metadata: SearchMetadata {
                query: query.to_string(),
                total_duration_ms,
                sources_queried,
                sources_responded,
            },
            source_stats,
        })
    }
}

/// Race one adapter against the per-source timeout.
///
/// Whichever settles first decides the recorded outcome; on timeout the
/// adapter future is dropped here, which is the cancellation point.
async fn race_source(
    adapter: &Arc<dyn SourceAdapter>,
    query: &SourceQuery,
    timeout: Duration,
) -> (KnowledgeSource, SourceStats, Option<Vec<SourceHit>>) {
    let source = adapter.source();
    let (outcome, elapsed) = timed(tokio::time::timeout(timeout, adapter.query(query))).await;
    let elapsed_ms = elapsed.as_millis() as u64;

    match outcome {
        Ok(Ok(hits)) => {
            debug!(%source, count = hits.len(), elapsed_ms, "source responded");
            (
                source,
                SourceStats::responded(elapsed_ms, hits.len()),
                Some(hits),
            )
        }
        Ok(Err(error)) => {
            warn!(%source, %error, elapsed_ms, "source failed");
            (
                source,
                SourceStats::failed(elapsed_ms, error.to_string()),
                None,
            )
        }
        Err(_) => {
            warn!(%source, elapsed_ms, timeout_ms = timeout.as_millis() as u64, "source timed out");
            (source, SourceStats::timed_out(elapsed_ms), None)
        }
    }
}
