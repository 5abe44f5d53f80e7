//! Error types for tessera operations.
//!
//! The taxonomy separates configuration errors (rejected before any storage
//! is touched), data corruption (persisted state missing or unreadable),
//! and unsupported predicates or operations (surfaced synchronously).

use crate::vector::ElementKind;
use thiserror::Error;

/// Result type alias using [`TesseraError`].
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Errors that can occur during tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Invalid index configuration. Rejected at construction, never clamped.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Distance function is not in the supported set for this index family.
    #[error("unsupported distance function: {0}")]
    UnsupportedDistance(String),

    /// Persisted quantizer or signature data is missing or unreadable at its
    /// expected key. The index is unusable until rebuilt.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The predicate cannot be served by this index.
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// Operation not supported by this index type (e.g. partitioned scans).
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// The index is stale and refuses queries until rebuilt.
    #[error("index '{0}' is stale and must be rebuilt")]
    IndexStale(String),

    /// Vector dimensions do not match the indexed column.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected vector dimension.
        expected: usize,
        /// Actual vector dimension provided.
        actual: usize,
    },

    /// Vector element kind does not match the kind the index was built for.
    #[error("element kind mismatch: expected {expected:?}, got {actual:?}")]
    ElementMismatch {
        /// Element kind the index was built for.
        expected: ElementKind,
        /// Element kind of the offending value.
        actual: ElementKind,
    },

    /// Training requires more sample vectors than were provided.
    #[error("insufficient training data: required {required}, got {actual}")]
    InsufficientTrainingData {
        /// Minimum number of sample vectors required.
        required: usize,
        /// Actual number of sample vectors provided.
        actual: usize,
    },

    /// A named store does not exist in the environment.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// Error during serialization or deserialization.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Checksum verification failed while reading a persisted blob.
    #[error("checksum mismatch: persisted blob may be corrupted")]
    ChecksumMismatch,
}

impl TesseraError {
    /// Creates a new `InvalidConfig` error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a new `DataCorruption` error.
    pub fn data_corruption(msg: impl Into<String>) -> Self {
        Self::DataCorruption(msg.into())
    }

    /// Creates a new `UnsupportedPredicate` error.
    pub fn unsupported_predicate(msg: impl Into<String>) -> Self {
        Self::UnsupportedPredicate(msg.into())
    }

    /// Creates a new `NotSupported` error.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Creates a new `DimensionMismatch` error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}

impl From<bincode::Error> for TesseraError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TesseraError::dimension_mismatch(128, 256);
        assert_eq!(err.to_string(), "dimension mismatch: expected 128, got 256");

        let err = TesseraError::UnsupportedDistance("chebyshev".into());
        assert_eq!(err.to_string(), "unsupported distance function: chebyshev");

        let err = TesseraError::IndexStale("features_idx".into());
        assert_eq!(
            err.to_string(),
            "index 'features_idx' is stale and must be rebuilt"
        );
    }

    #[test]
    fn test_element_mismatch_display() {
        let err = TesseraError::ElementMismatch {
            expected: ElementKind::F32,
            actual: ElementKind::F64,
        };
        assert_eq!(
            err.to_string(),
            "element kind mismatch: expected F32, got F64"
        );
    }
}
