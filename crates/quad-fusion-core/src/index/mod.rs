//! Approximate nearest-neighbor vector index.
//!
//! An arena-backed HNSW proximity graph with optional int8 quantization
//! and a versioned snapshot format. Owned exclusively by the vector source
//! adapter; nothing else reaches into the graph.

mod error;
mod hnsw;
mod quantization;
mod snapshot;

pub use error::{IndexError, IndexResult};
pub use hnsw::{HnswConfig, HnswIndex, SearchHit};
pub use quantization::{quantized_distance, QuantizedVector};
pub use snapshot::{IndexSnapshot, SnapshotNode, SnapshotVector, SNAPSHOT_VERSION};
