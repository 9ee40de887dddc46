//! Contract constants exposed to callers.
//!
//! These caps are part of the external interface: `validate_options`
//! rejects anything above them before a single source is queried.

/// Maximum number of fused results a caller may request.
pub const MAX_TOP_K: usize = 100;

/// Maximum per-source timeout, in milliseconds.
pub const MAX_SOURCE_TIMEOUT_MS: u64 = 30_000;

/// Maximum graph traversal depth, in hops.
pub const MAX_GRAPH_DEPTH: usize = 5;

/// Default number of fused results.
pub const DEFAULT_TOP_K: usize = 10;

/// Default per-source timeout, in milliseconds.
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 5_000;

/// Default graph traversal depth, in hops.
pub const DEFAULT_GRAPH_DEPTH: usize = 2;

/// Default episodic memory namespace.
pub const DEFAULT_MEMORY_NAMESPACE: &str = "default";

/// Default minimum confidence for pattern-store hits.
pub const DEFAULT_MIN_PATTERN_CONFIDENCE: f32 = 0.3;

/// Default per-source fusion weights, in canonical source order
/// (vector, graph, memory, pattern). They sum to 1 as stored, but the
/// contract only requires a non-zero vector; weights are renormalized
/// before use.
pub const DEFAULT_WEIGHTS: [f64; 4] = [0.4, 0.3, 0.2, 0.1];

/// Tolerance used when asserting that normalized weights sum to 1.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-9;
