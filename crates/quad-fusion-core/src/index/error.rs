//! Error types for the vector index.

use thiserror::Error;

/// Errors raised by [`HnswIndex`](super::HnswIndex) operations.
///
/// Every variant is fatal to the specific operation that raised it and is
/// never retried internally. Failed operations leave the index unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// Vector length does not match the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The fixed dimension of this index instance.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// Insert of an id that is already present.
    ///
    /// Updates require an explicit delete + insert; silent replacement
    /// would leave the proximity graph inconsistent with the new vector.
    #[error("Duplicate id on insert: {id}")]
    DuplicateId {
        /// The id that already exists.
        id: String,
    },

    /// Delete or lookup of an id the index does not hold.
    #[error("Id not found: {id}")]
    NotFound {
        /// The unknown id.
        id: String,
    },

    /// Index configuration is unusable.
    #[error("Invalid index config: {message}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Snapshot carries a version this reader does not understand.
    #[error("Unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the snapshot document.
        found: u32,
        /// Version this reader supports.
        supported: u32,
    },

    /// Snapshot contents violate index invariants.
    ///
    /// # When This Occurs
    ///
    /// - A neighbor id with no corresponding node
    /// - A node without a stored vector
    /// - A neighbor listed at a level above its own max level
    #[error("Corrupt snapshot: {message}")]
    CorruptSnapshot {
        /// Description of the inconsistency.
        message: String,
    },
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = IndexError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert!(err.to_string().contains("384"));

        let err = IndexError::UnsupportedVersion {
            found: 9,
            supported: 1,
        };
        assert!(err.to_string().contains('9'));
    }
}
