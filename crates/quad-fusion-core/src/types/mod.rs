//! Domain types shared across the quad-fusion pipeline.
//!
//! Everything here is ephemeral query-scope data: raw hits coming back from
//! one source, per-source statistics for one query, and the fused, ranked
//! results handed to the caller. Nothing in this module is persisted by the
//! core; callers that want durable results own that concern.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier type for entities surfaced by any source.
///
/// Ids are opaque strings minted by the external stores; the core never
/// interprets them beyond equality and ordering (deterministic tie-breaks).
pub type EntityId = String;

/// The four federated knowledge sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    /// Approximate nearest-neighbor vector similarity index.
    Vector,
    /// Graph traversal store (bounded multi-hop neighborhood).
    Graph,
    /// Episodic memory store (namespace-scoped recall).
    Memory,
    /// Learned behavioral-pattern store.
    Pattern,
}

impl KnowledgeSource {
    /// All four sources, in canonical order.
    pub const ALL: [KnowledgeSource; 4] = [
        KnowledgeSource::Vector,
        KnowledgeSource::Graph,
        KnowledgeSource::Memory,
        KnowledgeSource::Pattern,
    ];

    /// Stable lowercase name, matching the serde representation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Memory => "memory",
            Self::Pattern => "pattern",
        }
    }
}

impl std::fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// `CoreError::Source` names its field `source`, which `thiserror` treats as the
// error's underlying cause and therefore requires to implement `std::error::Error`.
// The required `Debug`/`Display` bounds are already satisfied above.
impl std::error::Error for KnowledgeSource {}

/// One raw result from one source adapter.
///
/// `raw_score` lives in whatever scale the source produces (a similarity,
/// a decayed hop score, a confidence); the fusion scorer min-max normalizes
/// per source before combining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHit {
    /// Entity id as known to the originating store.
    pub id: EntityId,
    /// Source-native score, higher is better.
    pub raw_score: f32,
    /// Source-specific payload carried through to attribution.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SourceHit {
    /// Create a hit with empty metadata.
    pub fn new(id: impl Into<EntityId>, raw_score: f32) -> Self {
        Self {
            id: id.into(),
            raw_score,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Per-source attribution attached to a fused result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceContribution {
    /// Which source surfaced the entity.
    pub source: KnowledgeSource,
    /// The score as the source reported it.
    pub raw_score: f32,
    /// The score after per-source min-max normalization, in [0, 1].
    pub normalized_score: f32,
}

/// One fused, ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    /// Entity id.
    pub id: EntityId,
    /// Weighted fusion score in [0, 1].
    pub score: f32,
    /// Which sources contributed, and by how much.
    pub sources: Vec<SourceContribution>,
    /// Metadata from the highest-contributing source.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Outcome statistics for one source during one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStats {
    /// Whether the source produced a usable result set.
    pub responded: bool,
    /// Wall-clock time spent waiting on this source.
    pub duration_ms: u64,
    /// Number of hits returned (0 on failure or timeout).
    pub result_count: usize,
    /// Whether the source lost its timeout race.
    pub timed_out: bool,
    /// Error message if the adapter failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceStats {
    /// A successful outcome.
    pub fn responded(duration_ms: u64, result_count: usize) -> Self {
        Self {
            responded: true,
            duration_ms,
            result_count,
            timed_out: false,
            error: None,
        }
    }

    /// A timeout outcome.
    pub fn timed_out(duration_ms: u64) -> Self {
        Self {
            responded: false,
            duration_ms,
            result_count: 0,
            timed_out: true,
            error: None,
        }
    }

    /// A failed outcome.
    pub fn failed(duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            responded: false,
            duration_ms,
            result_count: 0,
            timed_out: false,
            error: Some(error.into()),
        }
    }
}

/// Query-level metadata returned with every successful search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// The caller's query text.
    pub query: String,
    /// End-to-end latency for the whole fan-out/fan-in/fuse cycle.
    pub total_duration_ms: u64,
    /// How many sources were queried (always 4 today).
    pub sources_queried: usize,
    /// How many sources produced usable results.
    pub sources_responded: usize,
}

/// The complete result envelope for one unified search.
///
/// Callers always receive either this, fully constructed, or a single
/// aggregate error; never a partial envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Fused results, ranked, capped at `top_k`.
    pub results: Vec<FusedResult>,
    /// Query-level metadata.
    pub metadata: SearchMetadata,
    /// Per-source outcome statistics, keyed in canonical source order.
    pub source_stats: BTreeMap<KnowledgeSource, SourceStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serde_names() {
        let json = serde_json::to_string(&KnowledgeSource::Vector).unwrap();
        assert_eq!(json, "\"vector\"");
        let back: KnowledgeSource = serde_json::from_str("\"pattern\"").unwrap();
        assert_eq!(back, KnowledgeSource::Pattern);
    }

    #[test]
    fn test_source_stats_constructors() {
        let ok = SourceStats::responded(12, 5);
        assert!(ok.responded);
        assert!(!ok.timed_out);
        assert_eq!(ok.result_count, 5);

        let to = SourceStats::timed_out(100);
        assert!(to.timed_out);
        assert!(!to.responded);
        assert_eq!(to.result_count, 0);

        let err = SourceStats::failed(3, "store unreachable");
        assert_eq!(err.error.as_deref(), Some("store unreachable"));
        assert!(!err.responded);
    }

    #[test]
    fn test_hit_builder() {
        let hit = SourceHit::new("doc-1", 0.9)
            .with_metadata(serde_json::json!({"namespace": "default"}));
        assert_eq!(hit.id, "doc-1");
        assert_eq!(hit.metadata["namespace"], "default");
    }
}
