//! Error types for RSCT Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Polynomial {poly:#x} is not primitive over GF(2^8)")]
    NonPrimitivePolynomial { poly: u16 },

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid shard geometry: {msg}")]
    InvalidGeometry { msg: String },

    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },
}

/// Result type for RSCT Core operations
pub type Result<T> = std::result::Result<T, CoreError>;
