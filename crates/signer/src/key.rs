//! Secret key handling.

use crate::error::{SignerError, SignerResult};
use std::fmt;

/// A shared secret used for HMAC signing.
///
/// The key material never appears in Debug output.
#[derive(Clone)]
pub struct SecretKey {
    inner: Vec<u8>,
}

impl SecretKey {
    /// Create a key from raw bytes.
    ///
    /// Rejects empty keys: an empty HMAC secret signs everything with a
    /// constant-derivable key.
    pub fn new(bytes: impl Into<Vec<u8>>) -> SignerResult<Self> {
        let inner = bytes.into();
        if inner.is_empty() {
            return Err(SignerError::KeyLoading("secret key is empty".to_string()));
        }
        Ok(Self { inner })
    }

    /// Create a key from a string, trimming surrounding whitespace
    /// (key files commonly end with a newline).
    pub fn from_str_trimmed(s: &str) -> SignerResult<Self> {
        Self::new(s.trim().as_bytes().to_vec())
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}
