//! Error types for RSCT Frame

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Container processing error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Cannot open input {path:?}: {source}")]
    InputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot open output {path:?}: {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Redundancy r={r} outside 1..=63")]
    InvalidRedundancy { r: u16 },

    #[error("Cannot determine source size: {0}")]
    SourceSize(#[source] io::Error),

    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Container header truncated")]
    TruncatedHeader,

    #[error("Bad container magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error("Unsupported container version {found}")]
    UnsupportedVersion { found: u16 },

    #[error("Container parameter mismatch: {msg}")]
    ParameterMismatch { msg: String },

    #[error("Invalid record format: {msg}")]
    InvalidFormat { msg: String },

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("FEC decoding failed: {msg}")]
    FecDecodingFailed { msg: String },

    #[error("Invalid FEC parameters: {msg}")]
    InvalidFecParameters { msg: String },

    #[error("Core error: {0}")]
    Core(#[from] rsct_core::CoreError),
}

impl FrameError {
    /// Map a core allocation failure onto the pipeline's own allocation kind
    pub(crate) fn from_core(err: rsct_core::CoreError) -> Self {
        match err {
            rsct_core::CoreError::Allocation { bytes } => FrameError::Allocation { bytes },
            other => FrameError::Core(other),
        }
    }
}

/// Result type for RSCT Frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
