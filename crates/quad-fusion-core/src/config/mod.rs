//! Configuration for the unified search pipeline.
//!
//! [`FusionOptions`] is the full per-query option set; [`FusionOptionsPatch`]
//! is the caller-supplied partial that deep-merges over an orchestrator's
//! defaults. Validation happens once, before any source is queried.
//!
//! Options can also be loaded from layered files and environment variables
//! (`config/default.toml`, `config/{QUAD_FUSION_ENV}.toml`, then
//! `QUAD_FUSION_`-prefixed variables), mirroring how the rest of the
//! deployment is configured.

pub mod constants;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::KnowledgeSource;
use constants::{
    DEFAULT_GRAPH_DEPTH, DEFAULT_MEMORY_NAMESPACE, DEFAULT_MIN_PATTERN_CONFIDENCE,
    DEFAULT_SOURCE_TIMEOUT_MS, DEFAULT_TOP_K, DEFAULT_WEIGHTS, MAX_GRAPH_DEPTH,
    MAX_SOURCE_TIMEOUT_MS, MAX_TOP_K,
};

/// Per-source fusion weights.
///
/// Weights need not sum to 1 as stored; [`FusionWeights::normalized`]
/// rescales them before use. An all-zero weight vector is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight for the vector similarity source.
    pub vector: f64,
    /// Weight for the graph traversal source.
    pub graph: f64,
    /// Weight for the episodic memory source.
    pub memory: f64,
    /// Weight for the learned-pattern source.
    pub pattern: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: DEFAULT_WEIGHTS[0],
            graph: DEFAULT_WEIGHTS[1],
            memory: DEFAULT_WEIGHTS[2],
            pattern: DEFAULT_WEIGHTS[3],
        }
    }
}

impl FusionWeights {
    /// Look up the weight for a source.
    pub fn get(&self, source: KnowledgeSource) -> f64 {
        match source {
            KnowledgeSource::Vector => self.vector,
            KnowledgeSource::Graph => self.graph,
            KnowledgeSource::Memory => self.memory,
            KnowledgeSource::Pattern => self.pattern,
        }
    }

    /// Sum of all four weights.
    pub fn sum(&self) -> f64 {
        self.vector + self.graph + self.memory + self.pattern
    }

    /// Validate that every weight is a finite value in [0, 1] and that at
    /// least one weight is positive.
    pub fn validate(&self) -> CoreResult<()> {
        for source in KnowledgeSource::ALL {
            let w = self.get(source);
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(CoreError::Validation {
                    field: format!("weights.{source}"),
                    message: format!("weight {w} outside [0.0, 1.0]"),
                });
            }
        }
        if self.sum() <= f64::EPSILON {
            return Err(CoreError::Validation {
                field: "weights".to_string(),
                message: "all-zero weight vector leaves nothing to rank by".to_string(),
            });
        }
        Ok(())
    }

    /// Return a copy rescaled to sum to exactly 1.
    ///
    /// Callers must validate first; normalizing an all-zero vector is a
    /// programming error and returns the vector unchanged.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        if sum <= f64::EPSILON {
            return *self;
        }
        Self {
            vector: self.vector / sum,
            graph: self.graph / sum,
            memory: self.memory / sum,
            pattern: self.pattern / sum,
        }
    }
}

/// Partial weight overrides.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FusionWeightsPatch {
    /// Override for the vector weight.
    pub vector: Option<f64>,
    /// Override for the graph weight.
    pub graph: Option<f64>,
    /// Override for the memory weight.
    pub memory: Option<f64>,
    /// Override for the pattern weight.
    pub pattern: Option<f64>,
}

impl FusionWeightsPatch {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.vector.is_none()
            && self.graph.is_none()
            && self.memory.is_none()
            && self.pattern.is_none()
    }

    /// Apply this patch over `base`, field by field.
    pub fn apply(&self, base: FusionWeights) -> FusionWeights {
        FusionWeights {
            vector: self.vector.unwrap_or(base.vector),
            graph: self.graph.unwrap_or(base.graph),
            memory: self.memory.unwrap_or(base.memory),
            pattern: self.pattern.unwrap_or(base.pattern),
        }
    }
}

/// Full option set for one unified search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionOptions {
    /// Per-source fusion weights.
    #[serde(default)]
    pub weights: FusionWeights,
    /// Number of fused results to return. Capped at [`MAX_TOP_K`].
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Per-source timeout in milliseconds. Capped at
    /// [`MAX_SOURCE_TIMEOUT_MS`].
    #[serde(default = "default_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Graph traversal depth in hops. Capped at [`MAX_GRAPH_DEPTH`].
    #[serde(default = "default_graph_depth")]
    pub graph_depth: usize,
    /// Episodic memory namespace to recall from.
    #[serde(default = "default_namespace")]
    pub memory_namespace: String,
    /// Minimum confidence for pattern-store hits, in [0, 1].
    #[serde(default = "default_min_confidence")]
    pub min_pattern_confidence: f32,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_timeout_ms() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_MS
}
fn default_graph_depth() -> usize {
    DEFAULT_GRAPH_DEPTH
}
fn default_namespace() -> String {
    DEFAULT_MEMORY_NAMESPACE.to_string()
}
fn default_min_confidence() -> f32 {
    DEFAULT_MIN_PATTERN_CONFIDENCE
}

impl Default for FusionOptions {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            top_k: DEFAULT_TOP_K,
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            graph_depth: DEFAULT_GRAPH_DEPTH,
            memory_namespace: DEFAULT_MEMORY_NAMESPACE.to_string(),
            min_pattern_confidence: DEFAULT_MIN_PATTERN_CONFIDENCE,
        }
    }
}

impl FusionOptions {
    /// Validate caps and weight sanity.
    ///
    /// Runs before any source is queried; a failure here is a
    /// configuration error, never retried.
    pub fn validate(&self) -> CoreResult<()> {
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(CoreError::Validation {
                field: "top_k".to_string(),
                message: format!("{} outside [1, {MAX_TOP_K}]", self.top_k),
            });
        }
        if self.source_timeout_ms == 0 || self.source_timeout_ms > MAX_SOURCE_TIMEOUT_MS {
            return Err(CoreError::Validation {
                field: "source_timeout_ms".to_string(),
                message: format!("{} outside [1, {MAX_SOURCE_TIMEOUT_MS}]", self.source_timeout_ms),
            });
        }
        if self.graph_depth == 0 || self.graph_depth > MAX_GRAPH_DEPTH {
            return Err(CoreError::Validation {
                field: "graph_depth".to_string(),
                message: format!("{} outside [1, {MAX_GRAPH_DEPTH}]", self.graph_depth),
            });
        }
        if !self.min_pattern_confidence.is_finite()
            || !(0.0..=1.0).contains(&self.min_pattern_confidence)
        {
            return Err(CoreError::Validation {
                field: "min_pattern_confidence".to_string(),
                message: format!("{} outside [0.0, 1.0]", self.min_pattern_confidence),
            });
        }
        self.weights.validate()
    }

    /// Load layered configuration for deployments.
    ///
    /// Order: `config/default.toml`, `config/{QUAD_FUSION_ENV}.toml`
    /// (default environment: `development`), then environment variables
    /// prefixed `QUAD_FUSION_` (e.g. `QUAD_FUSION_TOP_K=20`).
    pub fn load() -> CoreResult<Self> {
        let env = std::env::var("QUAD_FUSION_ENV").unwrap_or_else(|_| "development".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(config::Environment::with_prefix("QUAD_FUSION").separator("__"))
            .build()?;

        let options: FusionOptions = settings.try_deserialize()?;
        options.validate()?;
        Ok(options)
    }
}

/// Caller-supplied partial options, deep-merged over defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionOptionsPatch {
    /// Partial weight overrides.
    #[serde(default)]
    pub weights: FusionWeightsPatch,
    /// Override for `top_k`.
    pub top_k: Option<usize>,
    /// Override for `source_timeout_ms`.
    pub source_timeout_ms: Option<u64>,
    /// Override for `graph_depth`.
    pub graph_depth: Option<usize>,
    /// Override for `memory_namespace`.
    pub memory_namespace: Option<String>,
    /// Override for `min_pattern_confidence`.
    pub min_pattern_confidence: Option<f32>,
}

impl FusionOptionsPatch {
    /// Deep-merge this patch over `defaults`, producing a full option set.
    ///
    /// Does not validate; the orchestrator validates the merged result.
    pub fn merge_over(&self, defaults: &FusionOptions) -> FusionOptions {
        FusionOptions {
            weights: self.weights.apply(defaults.weights),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            source_timeout_ms: self.source_timeout_ms.unwrap_or(defaults.source_timeout_ms),
            graph_depth: self.graph_depth.unwrap_or(defaults.graph_depth),
            memory_namespace: self
                .memory_namespace
                .clone()
                .unwrap_or_else(|| defaults.memory_namespace.clone()),
            min_pattern_confidence: self
                .min_pattern_confidence
                .unwrap_or(defaults.min_pattern_confidence),
        }
    }
}
