//! Snapshot persistence for the vector index, through a real file.

use std::fs;

use quad_fusion_core::index::{HnswConfig, HnswIndex, IndexError, IndexSnapshot};

fn build_index() -> HnswIndex {
    let mut index = HnswIndex::with_seed(6, HnswConfig::default(), 2024).unwrap();
    for i in 0..80u32 {
        let angle = i as f32 * 0.1;
        index
            .insert(
                format!("vec-{i:03}"),
                vec![
                    angle.sin(),
                    angle.cos(),
                    (angle * 2.0).sin(),
                    (angle * 2.0).cos(),
                    angle * 0.01,
                    1.0,
                ],
            )
            .unwrap();
    }
    index
}

#[test]
fn snapshot_survives_a_disk_roundtrip() {
    let index = build_index();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    let json = serde_json::to_string_pretty(&index.serialize()).unwrap();
    fs::write(&path, json).unwrap();

    let loaded: IndexSnapshot = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let restored = HnswIndex::deserialize(loaded).unwrap();

    assert_eq!(restored.len(), index.len());

    // restored index ranks identically
    let query = vec![0.5, 0.86, 0.84, 0.54, 0.005, 1.0];
    let original_hits: Vec<String> = index
        .search(&query, 10, None)
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    let restored_hits: Vec<String> = restored
        .search(&query, 10, None)
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(original_hits, restored_hits);
}

#[test]
fn snapshot_is_stable_for_identical_state() {
    let index = build_index();
    let first = serde_json::to_string(&index.serialize()).unwrap();
    let second = serde_json::to_string(&index.serialize()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn future_major_version_is_rejected() {
    let index = build_index();
    let mut snapshot = index.serialize();
    snapshot.version += 1;

    let json = serde_json::to_string(&snapshot).unwrap();
    let reparsed: IndexSnapshot = serde_json::from_str(&json).unwrap();
    let err = HnswIndex::deserialize(reparsed).unwrap_err();
    assert!(matches!(err, IndexError::UnsupportedVersion { .. }));
}

#[test]
fn deletions_survive_snapshotting() {
    let mut index = build_index();
    index.delete("vec-010").unwrap();
    index.delete("vec-020").unwrap();

    let restored = HnswIndex::deserialize(index.serialize()).unwrap();
    assert_eq!(restored.len(), index.len());
    assert!(restored.get_vector("vec-010").is_none());
    assert!(restored.get_vector("vec-011").is_some());
}
