//! Fusion scorer: merges per-source raw results into one ranked list.
//!
//! Scores from different sources are not comparable as-is (a cosine
//! similarity, a hop decay, a learned confidence), so each source's raw
//! scores are min-max normalized over that source's own result set first.
//! The fused score is then the weighted sum of normalized scores.
//!
//! # Missing-source policy
//!
//! A source that did not surface an id contributes exactly 0 to that id's
//! fused score. Weights are NOT renormalized over the subset of sources
//! that happened to mention a specific id; an id backed by three sources
//! genuinely outranks one backed by a single source at equal normalized
//! scores. This is a fixed, tested contract.
//!
//! # Determinism
//!
//! Output ordering is score descending, ties broken by ascending id.
//! Given identical inputs, repeated calls return byte-identical orderings.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::FusionWeights;
use crate::similarity::normalize_score;
use crate::types::{EntityId, FusedResult, KnowledgeSource, SourceContribution, SourceHit};

struct Accumulated {
    score: f64,
    contributions: Vec<SourceContribution>,
    best_contribution: f64,
    metadata: serde_json::Value,
}

/// Fuse per-source result sets into a ranked, capped list.
///
/// `weights` are renormalized to sum to 1 before use; callers validate
/// them beforehand (an all-zero vector never reaches this point through
/// the orchestrator).
///
/// Within one source, duplicate ids keep their best raw score. Each fused
/// result carries full per-source attribution and the metadata of its
/// highest-weighted contribution.
pub fn fuse(
    per_source: Vec<(KnowledgeSource, Vec<SourceHit>)>,
    weights: &FusionWeights,
    top_k: usize,
) -> Vec<FusedResult> {
    let weights = weights.normalized();
    let mut accumulator: BTreeMap<EntityId, Accumulated> = BTreeMap::new();

    for (source, hits) in per_source {
        if hits.is_empty() {
            continue;
        }
        let weight = weights.get(source);

        // best raw score per id within this source
        let mut deduped: BTreeMap<EntityId, SourceHit> = BTreeMap::new();
        for hit in hits {
            match deduped.get(&hit.id) {
                Some(existing) if existing.raw_score >= hit.raw_score => {}
                _ => {
                    deduped.insert(hit.id.clone(), hit);
                }
            }
        }

        let min = deduped
            .values()
            .map(|h| h.raw_score)
            .fold(f32::INFINITY, f32::min);
        let max = deduped
            .values()
            .map(|h| h.raw_score)
            .fold(f32::NEG_INFINITY, f32::max);

        for (id, hit) in deduped {
            let normalized = normalize_score(hit.raw_score, min, max);
            let contribution = weight * normalized as f64;

            let entry = accumulator.entry(id).or_insert_with(|| Accumulated {
                score: 0.0,
                contributions: Vec::new(),
                best_contribution: f64::NEG_INFINITY,
                metadata: serde_json::Value::Null,
            });
            entry.score += contribution;
            entry.contributions.push(SourceContribution {
                source,
                raw_score: hit.raw_score,
                normalized_score: normalized,
            });
            if contribution > entry.best_contribution {
                entry.best_contribution = contribution;
                entry.metadata = hit.metadata;
            }
        }
    }

    // BTreeMap iteration is id-ascending, so the stable sort leaves equal
    // scores in ascending-id order
    let mut results: Vec<FusedResult> = accumulator
        .into_iter()
        .map(|(id, acc)| FusedResult {
            id,
            score: acc.score as f32,
            sources: acc.contributions,
            metadata: acc.metadata,
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(top_k);

    debug!(fused = results.len(), "fusion complete");
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(vector: f64, graph: f64, memory: f64, pattern: f64) -> FusionWeights {
        FusionWeights {
            vector,
            graph,
            memory,
            pattern,
        }
    }

    /// Anchor hits at 0.0 and 1.0 so min-max normalization leaves the
    /// interesting score untouched.
    fn anchored(source_scores: &[(&str, f32)]) -> Vec<SourceHit> {
        let mut hits = vec![
            SourceHit::new("zz-anchor-low", 0.0),
            SourceHit::new("zz-anchor-high", 1.0),
        ];
        hits.extend(
            source_scores
                .iter()
                .map(|(id, score)| SourceHit::new(*id, *score)),
        );
        hits
    }

    #[test]
    fn test_weighted_combination_example() {
        // vector says x = 0.9, graph says x = 0.2, both at weight 0.5:
        // fused score is 0.5 * 0.9 + 0.5 * 0.2 = 0.55
        let results = fuse(
            vec![
                (KnowledgeSource::Vector, anchored(&[("x", 0.9)])),
                (KnowledgeSource::Graph, anchored(&[("x", 0.2)])),
            ],
            &weights(0.5, 0.5, 0.0, 0.0),
            10,
        );
        let x = results.iter().find(|r| r.id == "x").unwrap();
        assert!((x.score - 0.55).abs() < 1e-6, "got {}", x.score);
        assert_eq!(x.sources.len(), 2);
    }

    #[test]
    fn test_absent_source_contributes_zero() {
        // y appears only in the vector source; the graph weight must not
        // be redistributed onto it
        let results = fuse(
            vec![
                (KnowledgeSource::Vector, anchored(&[("y", 0.8)])),
                (KnowledgeSource::Graph, anchored(&[("other", 0.9)])),
            ],
            &weights(0.5, 0.5, 0.0, 0.0),
            10,
        );
        let y = results.iter().find(|r| r.id == "y").unwrap();
        assert!((y.score - 0.4).abs() < 1e-6, "got {}", y.score);
        assert_eq!(y.sources.len(), 1);
        assert_eq!(y.sources[0].source, KnowledgeSource::Vector);
    }

    #[test]
    fn test_single_result_source_normalizes_to_half() {
        let results = fuse(
            vec![(KnowledgeSource::Memory, vec![SourceHit::new("solo", 0.73)])],
            &weights(0.0, 0.0, 1.0, 0.0),
            10,
        );
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.5).abs() < 1e-6);
        assert!((results[0].sources[0].normalized_score - 0.5).abs() < 1e-6);
        assert!((results[0].sources[0].raw_score - 0.73).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic_ordering_with_ties() {
        let input = || {
            vec![(
                KnowledgeSource::Vector,
                vec![
                    SourceHit::new("beta", 0.5),
                    SourceHit::new("alpha", 0.5),
                    SourceHit::new("gamma", 1.0),
                    SourceHit::new("delta", 0.0),
                ],
            )]
        };
        let first = fuse(input(), &weights(1.0, 0.0, 0.0, 0.0), 10);
        let second = fuse(input(), &weights(1.0, 0.0, 0.0, 0.0), 10);

        let order: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["gamma", "alpha", "beta", "delta"]);
        assert_eq!(
            order,
            second.iter().map(|r| r.id.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_top_k_truncation() {
        let hits: Vec<SourceHit> = (0..20)
            .map(|i| SourceHit::new(format!("id{i:02}"), i as f32))
            .collect();
        let results = fuse(
            vec![(KnowledgeSource::Vector, hits)],
            &weights(1.0, 0.0, 0.0, 0.0),
            5,
        );
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].id, "id19");
    }

    #[test]
    fn test_duplicate_ids_within_source_keep_best() {
        let results = fuse(
            vec![(
                KnowledgeSource::Graph,
                vec![
                    SourceHit::new("dup", 0.2),
                    SourceHit::new("dup", 0.9),
                    SourceHit::new("low", 0.0),
                    SourceHit::new("high", 1.0),
                ],
            )],
            &weights(0.0, 1.0, 0.0, 0.0),
            10,
        );
        let dup = results.iter().find(|r| r.id == "dup").unwrap();
        assert_eq!(dup.sources.len(), 1);
        assert!((dup.sources[0].raw_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_weights_renormalized_before_use() {
        // weights 2:2 behave exactly like 0.5:0.5
        let input = || {
            vec![
                (KnowledgeSource::Vector, anchored(&[("x", 0.9)])),
                (KnowledgeSource::Graph, anchored(&[("x", 0.2)])),
            ]
        };
        let heavy = fuse(input(), &weights(2.0, 2.0, 0.0, 0.0), 10);
        let x = heavy.iter().find(|r| r.id == "x").unwrap();
        assert!((x.score - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_metadata_follows_strongest_contribution() {
        let vector_hit =
            SourceHit::new("x", 1.0).with_metadata(serde_json::json!({"from": "vector"}));
        let graph_hit =
            SourceHit::new("x", 0.4).with_metadata(serde_json::json!({"from": "graph"}));
        let results = fuse(
            vec![
                (
                    KnowledgeSource::Vector,
                    vec![vector_hit, SourceHit::new("pad", 0.0)],
                ),
                (
                    KnowledgeSource::Graph,
                    vec![graph_hit, SourceHit::new("pad", 1.0)],
                ),
            ],
            &weights(0.7, 0.3, 0.0, 0.0),
            10,
        );
        let x = results.iter().find(|r| r.id == "x").unwrap();
        assert_eq!(x.metadata["from"], "vector");
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        let results = fuse(Vec::new(), &FusionWeights::default(), 10);
        assert!(results.is_empty());
    }
}
