//! Versioned, serializable index snapshots.
//!
//! The snapshot is a plain serde document: dimension, configuration
//! (derived fields `m0`/`ml` are methods on the config and never appear),
//! entry point id, max level, the per-level adjacency of every node by id,
//! and the raw vectors. Deserialization reconstructs byte-for-byte
//! equivalent adjacency (set-equal per level) and recomputes everything
//! derived: slot numbering, the id map, and int8 codes when quantization
//! is enabled.
//!
//! Readers reject any snapshot whose major version they do not support.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::error::{IndexError, IndexResult};
use super::hnsw::{HnswConfig, HnswIndex, HnswNode};
use super::quantization::QuantizedVector;
use crate::types::EntityId;

/// Snapshot document version this reader writes and accepts.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One node's identity, level and per-level adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Entity id.
    pub id: EntityId,
    /// The node's max level.
    pub level: usize,
    /// `(level, neighbor ids)` pairs, one per level `0..=level`.
    pub connections: Vec<(usize, Vec<EntityId>)>,
}

/// One stored vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotVector {
    /// Entity id.
    pub id: EntityId,
    /// Full-precision components.
    pub data: Vec<f32>,
}

/// The complete persisted form of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Document version; see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Fixed vector dimension.
    pub dimension: usize,
    /// Index configuration, minus derived fields.
    pub config: HnswConfig,
    /// Id of the entry-point node, if the index is non-empty.
    pub entry_point: Option<EntityId>,
    /// Current maximum level.
    pub max_level: usize,
    /// Adjacency, sorted by id for stable output.
    pub nodes: Vec<SnapshotNode>,
    /// Raw vectors, sorted by id.
    pub vectors: Vec<SnapshotVector>,
}

impl HnswIndex {
    /// Emit a snapshot of the whole index.
    ///
    /// Nodes, vectors and neighbor lists are sorted by id so the document
    /// is stable across runs for identical graph state.
    pub fn serialize(&self) -> IndexSnapshot {
        let mut nodes: Vec<SnapshotNode> = Vec::with_capacity(self.len());
        let mut vectors: Vec<SnapshotVector> = Vec::with_capacity(self.len());

        for node in self.nodes.iter().flatten() {
            let mut connections = Vec::with_capacity(node.level + 1);
            for (level, level_list) in node.neighbors.iter().enumerate() {
                let mut ids: Vec<EntityId> = level_list
                    .iter()
                    .filter_map(|&slot| self.node(slot).map(|n| n.id.clone()))
                    .collect();
                ids.sort();
                connections.push((level, ids));
            }
            nodes.push(SnapshotNode {
                id: node.id.clone(),
                level: node.level,
                connections,
            });
            vectors.push(SnapshotVector {
                id: node.id.clone(),
                data: node.vector.clone(),
            });
        }

        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        vectors.sort_by(|a, b| a.id.cmp(&b.id));

        let entry_point = self
            .entry_point
            .and_then(|slot| self.node(slot))
            .map(|n| n.id.clone());

        IndexSnapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension,
            config: self.config.clone(),
            entry_point,
            max_level: self.max_level,
            nodes,
            vectors,
        }
    }

    /// Rebuild an index from a snapshot.
    ///
    /// # Errors
    ///
    /// - [`IndexError::UnsupportedVersion`] for a version this reader does
    ///   not understand
    /// - [`IndexError::CorruptSnapshot`] for dangling neighbor ids,
    ///   missing or mis-sized vectors, level inconsistencies, or an entry
    ///   point that does not hold the max level
    pub fn deserialize(snapshot: IndexSnapshot) -> IndexResult<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        snapshot.config.validate()?;
        if snapshot.dimension == 0 {
            return Err(IndexError::InvalidConfig {
                message: "dimension must be >= 1".to_string(),
            });
        }

        let mut vectors_by_id: HashMap<&str, &SnapshotVector> = HashMap::new();
        for v in &snapshot.vectors {
            if v.data.len() != snapshot.dimension {
                return Err(IndexError::CorruptSnapshot {
                    message: format!(
                        "vector '{}' has dimension {}, expected {}",
                        v.id,
                        v.data.len(),
                        snapshot.dimension
                    ),
                });
            }
            vectors_by_id.insert(v.id.as_str(), v);
        }

        // first pass: allocate slots and levels
        let mut id_to_slot: HashMap<EntityId, usize> = HashMap::with_capacity(snapshot.nodes.len());
        let mut level_by_slot: Vec<usize> = Vec::with_capacity(snapshot.nodes.len());
        for (slot, node) in snapshot.nodes.iter().enumerate() {
            if id_to_slot.insert(node.id.clone(), slot).is_some() {
                return Err(IndexError::CorruptSnapshot {
                    message: format!("duplicate node id '{}'", node.id),
                });
            }
            level_by_slot.push(node.level);
        }

        // second pass: materialize nodes and resolve adjacency
        let mut nodes: Vec<Option<HnswNode>> = Vec::with_capacity(snapshot.nodes.len());
        for snap_node in &snapshot.nodes {
            let vector = vectors_by_id
                .get(snap_node.id.as_str())
                .map(|v| v.data.clone())
                .ok_or_else(|| IndexError::CorruptSnapshot {
                    message: format!("node '{}' has no stored vector", snap_node.id),
                })?;

            if snap_node.connections.len() != snap_node.level + 1 {
                return Err(IndexError::CorruptSnapshot {
                    message: format!(
                        "node '{}' at level {} carries {} connection lists",
                        snap_node.id,
                        snap_node.level,
                        snap_node.connections.len()
                    ),
                });
            }

            let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); snap_node.level + 1];
            for (level, ids) in &snap_node.connections {
                if *level > snap_node.level {
                    return Err(IndexError::CorruptSnapshot {
                        message: format!(
                            "node '{}' lists connections at level {} above its level {}",
                            snap_node.id, level, snap_node.level
                        ),
                    });
                }
                for id in ids {
                    let &slot = id_to_slot.get(id).ok_or_else(|| IndexError::CorruptSnapshot {
                        message: format!(
                            "node '{}' references unknown neighbor '{}'",
                            snap_node.id, id
                        ),
                    })?;
                    if level_by_slot[slot] < *level {
                        return Err(IndexError::CorruptSnapshot {
                            message: format!(
                                "neighbor '{}' appears at level {} but only reaches level {}",
                                id, level, level_by_slot[slot]
                            ),
                        });
                    }
                    if neighbors[*level].contains(&slot) {
                        return Err(IndexError::CorruptSnapshot {
                            message: format!(
                                "node '{}' lists neighbor '{}' twice at level {}",
                                snap_node.id, id, level
                            ),
                        });
                    }
                    neighbors[*level].push(slot);
                }
            }

            let quantized = if snapshot.config.quantize {
                Some(QuantizedVector::quantize(&vector))
            } else {
                None
            };

            nodes.push(Some(HnswNode {
                id: snap_node.id.clone(),
                vector,
                quantized,
                level: snap_node.level,
                neighbors,
            }));
        }

        let entry_point = match &snapshot.entry_point {
            Some(id) => {
                let &slot = id_to_slot.get(id).ok_or_else(|| IndexError::CorruptSnapshot {
                    message: format!("entry point '{id}' is not a stored node"),
                })?;
                if level_by_slot[slot] != snapshot.max_level {
                    return Err(IndexError::CorruptSnapshot {
                        message: format!(
                            "entry point '{}' holds level {}, max level is {}",
                            id, level_by_slot[slot], snapshot.max_level
                        ),
                    });
                }
                Some(slot)
            }
            None => {
                if !snapshot.nodes.is_empty() {
                    return Err(IndexError::CorruptSnapshot {
                        message: "non-empty snapshot without an entry point".to_string(),
                    });
                }
                None
            }
        };

        Ok(HnswIndex {
            dimension: snapshot.dimension,
            config: snapshot.config,
            nodes,
            id_to_slot,
            free_slots: Vec::new(),
            entry_point,
            max_level: snapshot.max_level,
            rng: StdRng::from_entropy(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn adjacency_by_id(index: &HnswIndex) -> BTreeMap<EntityId, Vec<BTreeSet<EntityId>>> {
        let mut out = BTreeMap::new();
        for node in index.nodes.iter().flatten() {
            let levels: Vec<BTreeSet<EntityId>> = node
                .neighbors
                .iter()
                .map(|level_list| {
                    level_list
                        .iter()
                        .filter_map(|&slot| index.node(slot).map(|n| n.id.clone()))
                        .collect()
                })
                .collect();
            out.insert(node.id.clone(), levels);
        }
        out
    }

    fn populated_index() -> HnswIndex {
        let mut index = HnswIndex::with_seed(3, HnswConfig::default(), 99).expect("valid config");
        for i in 0..60u32 {
            let x = (i % 8) as f32;
            let y = (i / 8) as f32;
            index
                .insert(format!("node{i:02}"), vec![x, y, x * y * 0.1])
                .unwrap();
        }
        index
    }

    #[test]
    fn test_roundtrip_adjacency_set_equal() {
        let index = populated_index();
        let snapshot = index.serialize();
        let restored = HnswIndex::deserialize(snapshot).unwrap();

        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.max_level, index.max_level);
        assert_eq!(adjacency_by_id(&restored), adjacency_by_id(&index));

        // entry point survives by id
        let original_entry = index.entry_point.and_then(|s| index.node(s)).map(|n| n.id.clone());
        let restored_entry = restored
            .entry_point
            .and_then(|s| restored.node(s))
            .map(|n| n.id.clone());
        assert_eq!(original_entry, restored_entry);
    }

    #[test]
    fn test_roundtrip_through_json() {
        let index = populated_index();
        let json = serde_json::to_string(&index.serialize()).unwrap();
        let snapshot: IndexSnapshot = serde_json::from_str(&json).unwrap();
        let restored = HnswIndex::deserialize(snapshot).unwrap();
        assert_eq!(adjacency_by_id(&restored), adjacency_by_id(&index));

        // restored index answers searches identically
        let query = vec![3.0, 4.0, 1.2];
        let a = index.search(&query, 5, None).unwrap();
        let b = restored.search(&query, 5, None).unwrap();
        assert_eq!(
            a.iter().map(|h| &h.id).collect::<Vec<_>>(),
            b.iter().map(|h| &h.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_unknown_version_rejected() {
        let index = populated_index();
        let mut snapshot = index.serialize();
        snapshot.version = SNAPSHOT_VERSION + 1;
        let err = HnswIndex::deserialize(snapshot).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_dangling_neighbor_rejected() {
        let index = populated_index();
        let mut snapshot = index.serialize();
        snapshot.nodes[0].connections[0].1.push("phantom".to_string());
        let err = HnswIndex::deserialize(snapshot).unwrap_err();
        assert!(matches!(err, IndexError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_missing_vector_rejected() {
        let index = populated_index();
        let mut snapshot = index.serialize();
        snapshot.vectors.remove(0);
        let err = HnswIndex::deserialize(snapshot).unwrap_err();
        assert!(matches!(err, IndexError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_empty_index_roundtrip() {
        let index = HnswIndex::with_seed(4, HnswConfig::default(), 1).unwrap();
        let restored = HnswIndex::deserialize(index.serialize()).unwrap();
        assert!(restored.is_empty());
        assert!(restored.entry_point.is_none());
    }

    #[test]
    fn test_quantized_codes_recomputed_on_load() {
        let mut index = HnswIndex::with_seed(
            4,
            HnswConfig {
                quantize: true,
                ..HnswConfig::default()
            },
            5,
        )
        .unwrap();
        for i in 0..20u32 {
            index
                .insert(format!("v{i:02}"), vec![i as f32, 1.0, -1.0, 0.5])
                .unwrap();
        }
        let restored = HnswIndex::deserialize(index.serialize()).unwrap();
        for node in restored.nodes.iter().flatten() {
            assert!(node.quantized.is_some());
        }
    }
}
