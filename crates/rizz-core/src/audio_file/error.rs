//! Source reader error types

use thiserror::Error;

/// Failure to turn a file into a [`Track`](super::Track)
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Extension or codec the engine cannot decode
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container is malformed or a required sub-block is missing
    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    /// Underlying read failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for source reader operations
pub type DecodeResult<T> = Result<T, DecodeError>;
