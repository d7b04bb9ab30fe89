//! Signer error types.

use thiserror::Error;

/// Signing operation errors.
///
/// Most variants are rejections: the request was understood but refused, and
/// the client sees a 4xx. Only key handling and I/O are server-side faults.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("policy has no bucket condition")]
    MissingBucket,

    #[error("bucket {declared:?} does not match expected bucket {expected:?}")]
    BucketMismatch { expected: String, declared: String },

    #[error("request does not reference the expected bucket {expected:?}")]
    BucketNotReferenced { expected: String },

    #[error("declared content-length-range does not match configured limits")]
    SizeBoundMismatch,

    #[error("policy declares no content-length-range but limits are configured")]
    MissingSizeBounds,

    #[error("missing or malformed credential scope: {0}")]
    MalformedScope(String),

    #[error("malformed canonical request string: {0}")]
    MalformedRequest(String),

    #[error("key loading error: {0}")]
    KeyLoading(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignerError {
    /// Whether this error is a rejection of the client's request, as opposed
    /// to a server-side fault.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::KeyLoading(_) | Self::Io(_))
    }
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
