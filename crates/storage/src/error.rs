//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("upload is missing part indices {missing:?}")]
    MissingParts { missing: Vec<u32> },

    #[error("part index {index} out of range for {total} declared parts")]
    InvalidPartIndex { index: u32, total: u32 },

    #[error("declared part count {declared} outside 1..={max}")]
    InvalidPartCount { declared: u32, max: u32 },

    #[error("upload session error: {0}")]
    Session(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
