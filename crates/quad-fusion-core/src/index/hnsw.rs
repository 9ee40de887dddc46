//! From-scratch HNSW (Hierarchical Navigable Small World) index.
//!
//! A multi-layer proximity graph over string-keyed vectors. The adjacency
//! is arena-backed: nodes live in a dense slot vector with an id-to-slot
//! map, and neighbor lists hold slot indices, so traversal stays
//! cache-friendly and there is no cyclic ownership to manage.
//!
//! # Structure
//!
//! - Every node draws a max level from an exponential distribution
//!   (`L = floor(-ln(U) * mL)`), and owns one neighbor list per level
//!   `0..=L`.
//! - The entry point is always a node holding the current maximum level.
//! - Search and insert descend greedily from the entry point through upper
//!   layers, then widen to a bounded beam (`ef`) on the lower layers.
//!
//! Edges are near-symmetric but symmetry is not structurally enforced:
//! pruning a full neighbor list on one endpoint can leave a
//! one-directional edge. That is a property of the algorithm, not
//! corruption.
//!
//! # Mutability
//!
//! All methods that touch the graph take `&mut self` or `&self`; callers
//! that share an index across tasks wrap it in a reader-writer lock so a
//! structural operation never interleaves with a traversal (see
//! `sources::vector`).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::error::{IndexError, IndexResult};
use super::quantization::{quantized_distance, QuantizedVector};
use crate::similarity::{distance, DistanceMetric};
use crate::types::EntityId;

/// Tunable parameters for the proximity graph.
///
/// `m0 = 2m` and `ml = 1/ln(m)` are derived, never stored or configured
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum neighbors per node per layer above 0.
    pub m: usize,
    /// Beam width while building.
    pub ef_construction: usize,
    /// Default beam width while searching.
    pub ef_search: usize,
    /// Distance metric.
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Keep int8 codes alongside full vectors and beam-search over them.
    #[serde(default)]
    pub quantize: bool,
    /// Survivors re-scored at full precision after a quantized beam.
    /// Defaults to `2k` at query time when unset.
    #[serde(default)]
    pub rerank_candidates: Option<usize>,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            metric: DistanceMetric::Cosine,
            quantize: false,
            rerank_candidates: None,
        }
    }
}

impl HnswConfig {
    /// Layer-0 neighbor cap, `2m`.
    #[inline]
    pub fn m0(&self) -> usize {
        self.m * 2
    }

    /// Level-draw multiplier, `1 / ln(m)`.
    #[inline]
    pub fn ml(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    /// Validate the parameter set.
    pub fn validate(&self) -> IndexResult<()> {
        if self.m < 2 {
            return Err(IndexError::InvalidConfig {
                message: format!("m must be >= 2, got {}", self.m),
            });
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(IndexError::InvalidConfig {
                message: "ef_construction and ef_search must be >= 1".to_string(),
            });
        }
        if self.rerank_candidates == Some(0) {
            return Err(IndexError::InvalidConfig {
                message: "rerank_candidates must be >= 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

/// One search result: an id and its distance under the index metric.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Stored entity id.
    pub id: EntityId,
    /// Distance to the query; lower is closer.
    pub distance: f32,
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub(super) struct HnswNode {
    pub(super) id: EntityId,
    pub(super) vector: Vec<f32>,
    pub(super) quantized: Option<QuantizedVector>,
    pub(super) level: usize,
    /// One neighbor list per level `0..=level`; slot indices, unique,
    /// unordered.
    pub(super) neighbors: Vec<Vec<usize>>,
}

/// `(distance, slot)` ordered ascending by distance, then slot.
///
/// Distances are guarded against NaN before they get here (`f32::MAX`
/// fallbacks), so the total order is well defined.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist: f32,
    slot: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The index proper.
pub struct HnswIndex {
    pub(super) dimension: usize,
    pub(super) config: HnswConfig,
    pub(super) nodes: Vec<Option<HnswNode>>,
    pub(super) id_to_slot: HashMap<EntityId, usize>,
    pub(super) free_slots: Vec<usize>,
    pub(super) entry_point: Option<usize>,
    pub(super) max_level: usize,
    pub(super) rng: StdRng,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.id_to_slot.len())
            .field("max_level", &self.max_level)
            .field("metric", &self.config.metric)
            .field("quantize", &self.config.quantize)
            .finish()
    }
}

impl HnswIndex {
    /// Create an empty index with the given fixed dimension.
    pub fn new(dimension: usize, config: HnswConfig) -> IndexResult<Self> {
        Self::with_rng(dimension, config, StdRng::from_entropy())
    }

    /// Create an empty index with a seeded level generator.
    ///
    /// Construction becomes fully deterministic for a fixed insert order.
    pub fn with_seed(dimension: usize, config: HnswConfig, seed: u64) -> IndexResult<Self> {
        Self::with_rng(dimension, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(dimension: usize, config: HnswConfig, rng: StdRng) -> IndexResult<Self> {
        config.validate()?;
        if dimension == 0 {
            return Err(IndexError::InvalidConfig {
                message: "dimension must be >= 1".to_string(),
            });
        }
        Ok(Self {
            dimension,
            config,
            nodes: Vec::new(),
            id_to_slot: HashMap::new(),
            free_slots: Vec::new(),
            entry_point: None,
            max_level: 0,
            rng,
        })
    }

    /// Fixed vector dimension of this instance.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Index configuration.
    #[inline]
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Number of stored vectors.
    #[inline]
    pub fn len(&self) -> usize {
        self.id_to_slot.len()
    }

    /// Whether the index holds no vectors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id_to_slot.is_empty()
    }

    /// Whether the id is present.
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.id_to_slot.contains_key(id)
    }

    /// Full-precision vector for an id, if present.
    pub fn get_vector(&self, id: &str) -> Option<&[f32]> {
        self.id_to_slot
            .get(id)
            .and_then(|&slot| self.node(slot))
            .map(|n| n.vector.as_slice())
    }

    /// Approximate resident size in bytes (vectors, codes, adjacency,
    /// id maps).
    pub fn memory_usage(&self) -> usize {
        let mut bytes = 0;
        for node in self.nodes.iter().flatten() {
            bytes += node.vector.len() * 4;
            bytes += node
                .quantized
                .as_ref()
                .map(QuantizedVector::estimated_size_bytes)
                .unwrap_or(0);
            bytes += node.neighbors.iter().map(|l| l.len() * 8).sum::<usize>();
            bytes += node.id.len() + 24;
        }
        bytes
    }

    // =====================================================================
    // Mutation
    // =====================================================================

    /// Insert a vector under a new id.
    ///
    /// # Errors
    ///
    /// - [`IndexError::DimensionMismatch`] when the vector length differs
    ///   from the index dimension
    /// - [`IndexError::DuplicateId`] when the id is already present;
    ///   updates require an explicit delete + insert
    ///
    /// Either error leaves the index unchanged.
    pub fn insert(&mut self, id: impl Into<EntityId>, vector: Vec<f32>) -> IndexResult<()> {
        let id = id.into();
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.id_to_slot.contains_key(&id) {
            return Err(IndexError::DuplicateId { id });
        }

        let level = self.draw_level();
        let quantized = if self.config.quantize {
            Some(QuantizedVector::quantize(&vector))
        } else {
            None
        };

        match self.entry_point {
            None => {
                let slot = self.alloc_slot(HnswNode {
                    id: id.clone(),
                    vector,
                    quantized,
                    level,
                    neighbors: vec![Vec::new(); level + 1],
                });
                self.id_to_slot.insert(id, slot);
                self.entry_point = Some(slot);
                self.max_level = level;
                Ok(())
            }
            Some(entry) => {
                self.insert_linked(id, vector, quantized, level, entry);
                Ok(())
            }
        }
    }

    /// Insert a batch, validating every entry before any mutation.
    ///
    /// Dimension and duplicate checks (against the index and within the
    /// batch) run first, so a bad entry rejects the whole batch with the
    /// index untouched.
    pub fn insert_batch(&mut self, entries: Vec<(EntityId, Vec<f32>)>) -> IndexResult<()> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(entries.len());
        for (id, vector) in &entries {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            if self.id_to_slot.contains_key(id) || !seen.insert(id) {
                return Err(IndexError::DuplicateId { id: id.clone() });
            }
        }
        for (id, vector) in entries {
            self.insert(id, vector)?;
        }
        Ok(())
    }

    /// Remove an id and every edge that references it.
    ///
    /// Inbound edges are removed by scanning all live neighbor lists:
    /// pruning leaves one-directional edges, so the deleted node's own
    /// lists do not enumerate every node that points at it, and slots are
    /// reused. Connectivity beyond edge removal is not repaired; heavy
    /// deletion churn calls for [`rebuild`](Self::rebuild).
    ///
    /// # Errors
    ///
    /// [`IndexError::NotFound`] when the id is unknown.
    pub fn delete(&mut self, id: &str) -> IndexResult<bool> {
        let slot = match self.id_to_slot.remove(id) {
            Some(slot) => slot,
            None => {
                return Err(IndexError::NotFound { id: id.to_string() });
            }
        };

        self.nodes[slot] = None;
        for node in self.nodes.iter_mut().flatten() {
            for level_list in node.neighbors.iter_mut() {
                level_list.retain(|&s| s != slot);
            }
        }
        self.free_slots.push(slot);

        if self.entry_point == Some(slot) {
            self.reelect_entry();
        }
        Ok(true)
    }

    /// Rebuild the proximity graph from the surviving vectors.
    ///
    /// The explicit compaction path after heavy deletion: every live
    /// vector is re-inserted (in ascending id order) into a fresh graph
    /// with the same configuration.
    pub fn rebuild(&mut self) -> IndexResult<()> {
        let mut entries: Vec<(EntityId, Vec<f32>)> = self
            .nodes
            .iter()
            .flatten()
            .map(|n| (n.id.clone(), n.vector.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fresh = Self::new(self.dimension, self.config.clone())?;
        for (id, vector) in entries {
            fresh.insert(id, vector)?;
        }
        *self = fresh;
        Ok(())
    }

    // =====================================================================
    // Search
    // =====================================================================

    /// Approximate k-nearest-neighbor search.
    ///
    /// Descends greedily to layer 1, then beam-searches layer 0 with width
    /// `max(ef, k)` (`ef` defaults to the configured `ef_search`). Ties
    /// break by ascending id so repeated searches are byte-identical.
    ///
    /// With quantization enabled the beam runs against the int8 codes and
    /// the best `rerank_candidates` (default `2k`) survivors are re-scored
    /// against full-precision vectors.
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`] when the query length differs
    /// from the index dimension.
    pub fn search(&self, query: &[f32], k: usize, ef: Option<usize>) -> IndexResult<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let entry = match self.entry_point {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = ef.unwrap_or(self.config.ef_search).max(k);

        let mut curr = entry;
        for layer in (1..=self.max_level).rev() {
            curr = self.greedy_descend(query, curr, layer);
        }

        let use_quantized = self.config.quantize;
        let beam = self.search_layer(query, &[curr], ef, 0, use_quantized);

        let mut scored: Vec<(f32, &EntityId)> = if use_quantized {
            let rerank = self.config.rerank_candidates.unwrap_or(2 * k).max(k);
            beam.into_iter()
                .take(rerank)
                .filter_map(|c| {
                    self.node(c.slot)
                        .map(|n| (distance(query, &n.vector, self.config.metric), &n.id))
                })
                .collect()
        } else {
            beam.into_iter()
                .filter_map(|c| self.node(c.slot).map(|n| (c.dist, &n.id)))
                .collect()
        };

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(dist, id)| SearchHit {
                id: id.clone(),
                distance: dist,
            })
            .collect())
    }

    // =====================================================================
    // Internals
    // =====================================================================

    pub(super) fn node(&self, slot: usize) -> Option<&HnswNode> {
        self.nodes.get(slot).and_then(|n| n.as_ref())
    }

    fn alloc_slot(&mut self, node: HnswNode) -> usize {
        match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Exponential level draw, `floor(-ln(U) * ml)` with U in (0, 1).
    fn draw_level(&mut self) -> usize {
        let u: f64 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        (-(u.ln()) * self.config.ml()).floor() as usize
    }

    fn slot_distance(&self, query: &[f32], slot: usize, use_quantized: bool) -> f32 {
        match self.node(slot) {
            Some(node) => {
                if use_quantized {
                    if let Some(ref q) = node.quantized {
                        return quantized_distance(query, q, self.config.metric);
                    }
                }
                distance(query, &node.vector, self.config.metric)
            }
            None => f32::MAX,
        }
    }

    fn slot_pair_distance(&self, a: usize, b: usize) -> f32 {
        match (self.node(a), self.node(b)) {
            (Some(na), Some(nb)) => distance(&na.vector, &nb.vector, self.config.metric),
            _ => f32::MAX,
        }
    }

    /// Single-best greedy move toward the query at one layer.
    fn greedy_descend(&self, query: &[f32], start: usize, layer: usize) -> usize {
        let mut curr = start;
        let mut curr_dist = self.slot_distance(query, curr, false);

        loop {
            let mut next: Option<(usize, f32)> = None;
            if let Some(node) = self.node(curr) {
                if let Some(level_list) = node.neighbors.get(layer) {
                    for &nb in level_list {
                        let d = self.slot_distance(query, nb, false);
                        if d < curr_dist && next.map_or(true, |(_, nd)| d < nd) {
                            next = Some((nb, d));
                        }
                    }
                }
            }
            match next {
                Some((slot, dist)) => {
                    curr = slot;
                    curr_dist = dist;
                }
                None => return curr,
            }
        }
    }

    /// Bounded best-first beam over one layer.
    ///
    /// Returns up to `ef` candidates sorted ascending by distance.
    fn search_layer(
        &self,
        query: &[f32],
        entries: &[usize],
        ef: usize,
        layer: usize,
        use_quantized: bool,
    ) -> Vec<Candidate> {
        let mut visited: HashSet<usize> = HashSet::new();
        // min-heap of frontier candidates
        let mut frontier: BinaryHeap<std::cmp::Reverse<Candidate>> = BinaryHeap::new();
        // max-heap holding the ef best seen so far
        let mut best: BinaryHeap<Candidate> = BinaryHeap::new();

        for &entry in entries {
            if visited.insert(entry) {
                let c = Candidate {
                    dist: self.slot_distance(query, entry, use_quantized),
                    slot: entry,
                };
                frontier.push(std::cmp::Reverse(c));
                best.push(c);
                if best.len() > ef {
                    best.pop();
                }
            }
        }

        while let Some(std::cmp::Reverse(c)) = frontier.pop() {
            let worst = best.peek().map(|w| w.dist).unwrap_or(f32::MAX);
            if best.len() >= ef && c.dist > worst {
                break;
            }
            if let Some(node) = self.node(c.slot) {
                if let Some(level_list) = node.neighbors.get(layer) {
                    for &nb in level_list {
                        if !visited.insert(nb) {
                            continue;
                        }
                        let d = self.slot_distance(query, nb, use_quantized);
                        let worst = best.peek().map(|w| w.dist).unwrap_or(f32::MAX);
                        if best.len() < ef || d < worst {
                            let cand = Candidate { dist: d, slot: nb };
                            frontier.push(std::cmp::Reverse(cand));
                            best.push(cand);
                            if best.len() > ef {
                                best.pop();
                            }
                        }
                    }
                }
            }
        }

        best.into_sorted_vec()
    }

    /// Diversity-heuristic neighbor selection.
    ///
    /// Walk candidates closest-first; keep one only if it is closer to the
    /// new vector than to every neighbor already selected. This stops a
    /// neighbor list from clustering in one direction of the space.
    fn select_diverse(&self, candidates: &[Candidate], cap: usize) -> Vec<Candidate> {
        let mut selected: Vec<Candidate> = Vec::with_capacity(cap);
        for &c in candidates {
            if selected.len() >= cap {
                break;
            }
            let diverse = selected
                .iter()
                .all(|s| self.slot_pair_distance(c.slot, s.slot) > c.dist);
            if diverse {
                selected.push(c);
            }
        }
        selected
    }

    #[inline]
    fn layer_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m0()
        } else {
            self.config.m
        }
    }

    /// Link a freshly drawn node into the graph (non-empty index path).
    fn insert_linked(
        &mut self,
        id: EntityId,
        vector: Vec<f32>,
        quantized: Option<QuantizedVector>,
        level: usize,
        entry: usize,
    ) {
        let mut curr = entry;
        if self.max_level > level {
            for layer in ((level + 1)..=self.max_level).rev() {
                curr = self.greedy_descend(&vector, curr, layer);
            }
        }

        // plan connections with immutable traversals before touching the arena
        let top = level.min(self.max_level);
        let mut planned: Vec<(usize, Vec<Candidate>)> = Vec::with_capacity(top + 1);
        let mut entries = vec![curr];
        for layer in (0..=top).rev() {
            let candidates =
                self.search_layer(&vector, &entries, self.config.ef_construction, layer, false);
            let selected = self.select_diverse(&candidates, self.layer_cap(layer));
            entries = candidates.iter().map(|c| c.slot).collect();
            if entries.is_empty() {
                entries = vec![curr];
            }
            planned.push((layer, selected));
        }

        let slot = self.alloc_slot(HnswNode {
            id: id.clone(),
            vector,
            quantized,
            level,
            neighbors: vec![Vec::new(); level + 1],
        });
        self.id_to_slot.insert(id, slot);

        for (layer, selected) in planned {
            for c in selected {
                self.connect(slot, c.slot, layer);
                self.connect(c.slot, slot, layer);
                self.prune_if_over(c.slot, layer);
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(slot);
        }
    }

    /// Add `to` into `from`'s neighbor set at `layer` (idempotent).
    fn connect(&mut self, from: usize, to: usize, layer: usize) {
        if let Some(node) = self.nodes.get_mut(from).and_then(|n| n.as_mut()) {
            if let Some(level_list) = node.neighbors.get_mut(layer) {
                if !level_list.contains(&to) {
                    level_list.push(to);
                }
            }
        }
    }

    /// Drop the farthest edge when a neighbor list exceeds its cap.
    ///
    /// Removal is one-directional; the pruned neighbor keeps its back
    /// edge. That is the accepted near-symmetry of the algorithm.
    fn prune_if_over(&mut self, slot: usize, layer: usize) {
        let cap = self.layer_cap(layer);
        let worst = {
            let node = match self.node(slot) {
                Some(node) => node,
                None => return,
            };
            let level_list = match node.neighbors.get(layer) {
                Some(list) if list.len() > cap => list,
                _ => return,
            };
            level_list
                .iter()
                .copied()
                .map(|nb| (self.slot_pair_distance(slot, nb), nb))
                .max_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.1.cmp(&b.1))
                })
                .map(|(_, nb)| nb)
        };
        if let Some(worst) = worst {
            if let Some(node) = self.nodes.get_mut(slot).and_then(|n| n.as_mut()) {
                if let Some(level_list) = node.neighbors.get_mut(layer) {
                    level_list.retain(|&s| s != worst);
                }
            }
        }
    }

    /// Pick a new entry point after the old one was deleted.
    ///
    /// Highest remaining level wins; ties break by ascending id so delete
    /// stays deterministic.
    fn reelect_entry(&mut self) {
        let mut best: Option<(usize, usize)> = None; // (slot, level)
        let mut best_id: Option<&str> = None;
        for (slot, node) in self.nodes.iter().enumerate() {
            if let Some(node) = node {
                let better = match best {
                    None => true,
                    Some((_, best_level)) => {
                        node.level > best_level
                            || (node.level == best_level
                                && best_id.map_or(true, |bid| node.id.as_str() < bid))
                    }
                };
                if better {
                    best = Some((slot, node.level));
                    best_id = Some(node.id.as_str());
                }
            }
        }
        self.entry_point = best.map(|(slot, _)| slot);
        self.max_level = best.map(|(_, level)| level).unwrap_or(0);
    }
}
