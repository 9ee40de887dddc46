//! Error types for quad-fusion-core.
//!
//! This module defines the central error type [`CoreError`] used throughout
//! the crate, along with the [`CoreResult<T>`] type alias. Index-level
//! failures have their own [`IndexError`](crate::index::IndexError) enum and
//! convert into `CoreError` at the adapter boundary.
//!
//! # Examples
//!
//! ```rust
//! use quad_fusion_core::CoreError;
//!
//! fn reject_top_k(top_k: usize) -> Result<(), CoreError> {
//!     Err(CoreError::Validation {
//!         field: "top_k".to_string(),
//!         message: format!("{top_k} exceeds cap"),
//!     })
//! }
//!
//! assert!(reject_top_k(9999).is_err());
//! ```

use thiserror::Error;

use crate::index::IndexError;
use crate::types::KnowledgeSource;

/// Top-level error type for quad-fusion-core operations.
///
/// The taxonomy follows the failure model of the unified search pipeline:
/// configuration errors are rejected before any source is queried, source
/// errors are recorded per-source and never abort the query on their own,
/// and `AllSourcesFailed` is the only aggregate failure surfaced to callers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An option value failed validation constraints.
    ///
    /// # When This Occurs
    ///
    /// - `top_k`, `source_timeout_ms` or `graph_depth` above their caps
    /// - A weight outside [0.0, 1.0], or an all-zero weight vector
    /// - NaN or Infinity in numeric option fields
    ///
    /// Always rejected before any source is queried; never retried.
    #[error("Validation error: {field} - {message}")]
    Validation {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// An error occurred inside the vector index.
    ///
    /// # When This Occurs
    ///
    /// - Dimension mismatch on insert or search
    /// - Duplicate id on insert
    /// - Snapshot version the reader does not understand
    ///
    /// Fatal to the specific index operation; the index is left unchanged.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// A single source adapter failed while answering a query.
    ///
    /// # When This Occurs
    ///
    /// - The external graph/episodic/pattern store returned an error
    /// - The query embedder failed to produce an embedding
    ///
    /// Recoverable: the orchestrator records it in that source's stats and
    /// continues with the remaining sources.
    #[error("Source {source} failed: {message}")]
    Source {
        /// Which of the four sources failed
        source: KnowledgeSource,
        /// Description of the failure
        message: String,
    },

    /// Every source failed or timed out for one query.
    ///
    /// The only aggregate failure surfaced to callers; partial success
    /// never produces this.
    #[error("All {attempted} sources failed or timed out")]
    AllSourcesFailed {
        /// Number of sources that were queried
        attempted: usize,
    },

    /// Error during serialization or deserialization.
    ///
    /// # When This Occurs
    ///
    /// - Index snapshot parsing failure
    /// - Corrupted stored data
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is invalid or could not be loaded.
    ///
    /// # When This Occurs
    ///
    /// - Missing or malformed configuration file
    /// - Environment variable parsing failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// An unexpected internal error occurred.
    ///
    /// These typically indicate bugs and should be reported.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = CoreError::Validation {
            field: "top_k".to_string(),
            message: "150 exceeds maximum of 100".to_string(),
        };
        assert!(err.to_string().contains("top_k"));
        assert!(err.to_string().contains("150"));
    }

    #[test]
    fn test_all_sources_failed_display() {
        let err = CoreError::AllSourcesFailed { attempted: 4 };
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_index_error_converts() {
        let err: CoreError = IndexError::DimensionMismatch {
            expected: 384,
            actual: 768,
        }
        .into();
        assert!(matches!(err, CoreError::Index(_)));
        assert!(err.to_string().contains("384"));
    }
}
