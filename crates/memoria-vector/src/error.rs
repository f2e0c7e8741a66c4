//! Error types for memoria-vector.

use thiserror::Error;

/// Result type for memoria-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when scoring or decoding embeddings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Dimension mismatch between two vectors.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Stored blob is not a whole number of f32 values.
    #[error("Invalid embedding blob: {0} bytes is not a multiple of 4")]
    InvalidBlob(usize),

    /// Invalid vector (e.g., empty).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),
}
