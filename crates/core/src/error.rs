//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid upload ID: {0}")]
    InvalidUploadId(String),

    #[error("part index {index} out of range for {total} declared parts")]
    InvalidPartIndex { index: u32, total: u32 },

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("too many parts: {declared} (maximum {max})")]
    TooManyParts { declared: u32, max: u32 },

    #[error("upload session error: {0}")]
    UploadSession(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
