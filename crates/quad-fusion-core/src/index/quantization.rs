//! Int8 scalar quantization for stored vectors.
//!
//! Compresses each f32 vector to one signed byte per component via min-max
//! scalar quantization, 4x smaller and cheap to score approximately. The
//! dequantization parameters (`scale`, `offset`) are stored per vector.
//!
//! # Formula
//!
//! - Quantize: `code = round((v - offset) / scale) - 128`, clamped to i8
//! - Dequantize: `v ≈ (code + 128) * scale + offset`
//!
//! Quantized distances are approximate; the index re-scores the top
//! survivors against full-precision vectors when re-ranking is enabled.

use serde::{Deserialize, Serialize};

use crate::similarity::DistanceMetric;

/// A vector compressed to int8 codes plus dequantization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedVector {
    /// One signed byte per component.
    pub codes: Vec<i8>,
    /// Step size between adjacent codes.
    pub scale: f32,
    /// Value represented by the lowest code.
    pub offset: f32,
}

impl QuantizedVector {
    /// Quantize a full-precision vector.
    ///
    /// A constant vector (max == min) quantizes with `scale = 0`; every
    /// component dequantizes back to `offset` exactly.
    pub fn quantize(vector: &[f32]) -> Self {
        let min = vector.iter().copied().fold(f32::INFINITY, f32::min);
        let max = vector.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let range = max - min;
        if !range.is_finite() || range <= f32::EPSILON {
            return Self {
                codes: vec![-128; vector.len()],
                scale: 0.0,
                offset: if min.is_finite() { min } else { 0.0 },
            };
        }

        let scale = range / 255.0;
        let codes = vector
            .iter()
            .map(|v| {
                let step = ((v - min) / scale).round().clamp(0.0, 255.0) as i16;
                (step - 128) as i8
            })
            .collect();

        Self {
            codes,
            scale,
            offset: min,
        }
    }

    /// Dequantize a single component.
    #[inline]
    pub fn dequantize_at(&self, i: usize) -> f32 {
        (self.codes[i] as f32 + 128.0) * self.scale + self.offset
    }

    /// Reconstruct the full (lossy) vector.
    pub fn dequantize(&self) -> Vec<f32> {
        (0..self.codes.len()).map(|i| self.dequantize_at(i)).collect()
    }

    /// Number of components.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the vector has no components.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Estimated storage size in bytes.
    #[inline]
    pub fn estimated_size_bytes(&self) -> usize {
        self.codes.len() + 4 + 4
    }
}

/// Approximate distance between a full-precision query and a quantized
/// stored vector, dequantizing on the fly.
///
/// Follows the same lower-is-closer convention as
/// [`distance`](crate::similarity::distance).
pub fn quantized_distance(query: &[f32], stored: &QuantizedVector, metric: DistanceMetric) -> f32 {
    if query.is_empty() || query.len() != stored.len() {
        return f32::MAX;
    }

    match metric {
        DistanceMetric::Cosine => {
            let mut dot = 0.0f32;
            let mut mag_q = 0.0f32;
            let mut mag_s = 0.0f32;
            for (i, q) in query.iter().enumerate() {
                let s = stored.dequantize_at(i);
                dot += q * s;
                mag_q += q * q;
                mag_s += s * s;
            }
            if mag_q <= 0.0 || mag_s <= 0.0 {
                return 1.0;
            }
            1.0 - (dot / (mag_q.sqrt() * mag_s.sqrt())).clamp(-1.0, 1.0)
        }
        DistanceMetric::Euclidean => {
            let mut sum = 0.0f32;
            for (i, q) in query.iter().enumerate() {
                let d = q - stored.dequantize_at(i);
                sum += d * d;
            }
            sum.sqrt()
        }
        DistanceMetric::Dot => {
            let mut dot = 0.0f32;
            for (i, q) in query.iter().enumerate() {
                dot += q * stored.dequantize_at(i);
            }
            -dot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_within_one_step() {
        let v = vec![-1.0, -0.25, 0.0, 0.4, 1.0];
        let q = QuantizedVector::quantize(&v);
        let back = q.dequantize();
        let step = q.scale;
        for (orig, rec) in v.iter().zip(back.iter()) {
            assert!(
                (orig - rec).abs() <= step,
                "component error {} exceeds step {}",
                (orig - rec).abs(),
                step
            );
        }
    }

    #[test]
    fn test_constant_vector() {
        let v = vec![0.7; 16];
        let q = QuantizedVector::quantize(&v);
        assert_eq!(q.scale, 0.0);
        for rec in q.dequantize() {
            assert!((rec - 0.7).abs() < 1e-6);
        }
    }

    #[test]
    fn test_extremes_map_to_code_range() {
        let v = vec![-2.0, 3.0];
        let q = QuantizedVector::quantize(&v);
        assert_eq!(q.codes[0], -128);
        assert_eq!(q.codes[1], 127);
    }

    #[test]
    fn test_quantized_distance_ranks_like_exact() {
        let query = vec![1.0, 0.0, 0.0];
        let near = QuantizedVector::quantize(&[0.9, 0.1, 0.0]);
        let far = QuantizedVector::quantize(&[-0.9, 0.2, 0.4]);

        let d_near = quantized_distance(&query, &near, DistanceMetric::Cosine);
        let d_far = quantized_distance(&query, &far, DistanceMetric::Cosine);
        assert!(d_near < d_far);
    }

    #[test]
    fn test_length_mismatch_is_max() {
        let q = QuantizedVector::quantize(&[1.0, 2.0]);
        assert_eq!(
            quantized_distance(&[1.0], &q, DistanceMetric::Euclidean),
            f32::MAX
        );
    }
}
