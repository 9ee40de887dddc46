//! Distance metrics and score normalization utilities.
//!
//! Pure functions shared by the vector index and the fusion scorer:
//! distance computation for the three supported metrics, min-max score
//! normalization, content hashing for dedup keys, and a timed-execution
//! wrapper for measuring adapter latency.
//!
//! # Distance Convention
//!
//! Every metric returns a value where **lower is closer**, so the index
//! can order candidates uniformly: cosine distance is `1 - cos(a, b)`,
//! dot-product distance is the negated dot product.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Distance metric used by the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Angular distance, `1 - cosine_similarity`. Default.
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Negated dot product, for maximum-inner-product search.
    Dot,
}

/// Compute the distance between two equal-length vectors.
///
/// Returns `f32::MAX` for length-mismatched or empty input rather than
/// panicking; the index validates dimensions before this is reached.
///
/// # Arguments
/// * `a`, `b` - dense vectors of equal length
/// * `metric` - which distance to compute
pub fn distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return f32::MAX;
    }
    match metric {
        DistanceMetric::Cosine => cosine_distance(a, b),
        DistanceMetric::Euclidean => euclidean_distance(a, b),
        DistanceMetric::Dot => -dot_product(a, b),
    }
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Zero-magnitude vectors are treated as maximally distant (distance 1.0)
/// instead of producing NaN.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = dot_product(a, b);
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 1.0;
    }

    1.0 - (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Euclidean (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Plain dot product.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Convert an index distance into a similarity-style raw score.
///
/// Higher is better, matching the `SourceHit::raw_score` convention:
/// - Cosine: `1 - distance` (already in [-1, 1], typically [0, 1])
/// - Euclidean: `1 / (1 + distance)`, mapping [0, inf) to (0, 1]
/// - Dot: the negation of the stored distance (the original dot product)
pub fn distance_to_score(dist: f32, metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - dist,
        DistanceMetric::Euclidean => 1.0 / (1.0 + dist),
        DistanceMetric::Dot => -dist,
    }
}

/// Min-max normalize a raw score into [0, 1].
///
/// Out-of-range input is clamped. When `min == max` (a single-result
/// source, or all scores identical) the neutral score 0.5 is returned:
/// it avoids the divide-by-zero while neither crowning nor burying the
/// degenerate result.
pub fn normalize_score(raw: f32, min: f32, max: f32) -> f32 {
    if (max - min).abs() <= f32::EPSILON {
        return 0.5;
    }
    ((raw - min) / (max - min)).clamp(0.0, 1.0)
}

/// SHA-256 hex digest of a content string, used as a dedup key.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        // write! to a String cannot fail
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Run a future and measure its wall-clock duration.
///
/// # Example
///
/// ```rust
/// # use quad_fusion_core::similarity::timed;
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let (value, elapsed) = timed(async { 41 + 1 }).await;
/// assert_eq!(value, 42);
/// assert!(elapsed.as_secs() < 1);
/// # });
/// ```
pub async fn timed<F, T>(future: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let value = future.await;
    (value, start.elapsed())
}
