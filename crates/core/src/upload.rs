//! Upload session types and lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload. Client-generated, one per logical file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUploadId(format!("{s:?}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Parts are still arriving.
    Receiving,
    /// Reassembly is in progress.
    Combining,
    /// The combined file is durable and parts have been purged.
    Complete,
    /// An unrecoverable error occurred; the client may restart the session.
    Failed,
    /// The upload was removed on explicit request.
    Deleted,
}

impl UploadState {
    /// Check if the session can still receive parts.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Receiving | Self::Combining)
    }

    /// Check if the session reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Deleted)
    }
}

/// An upload session tracking one logical file across part uploads.
///
/// The stored parts are the source of truth for which indices have landed;
/// `parts_received` here is a best-effort mirror kept for introspection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSession {
    /// Client-generated upload identifier.
    pub id: UploadId,
    /// User-supplied filename. Untrusted until sanitized.
    pub original_filename: String,
    /// Client-declared total size in bytes. A hint, never trusted as truth.
    pub declared_total_size: Option<u64>,
    /// Number of parts expected. 1 means a simple (non-chunked) upload.
    pub total_parts: u32,
    /// Part indices persisted so far.
    pub parts_received: BTreeSet<u32>,
    /// Current session state.
    pub state: UploadState,
    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the session was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UploadSession {
    /// Create a new session for a file arriving in `total_parts` parts.
    pub fn new(
        id: UploadId,
        original_filename: impl Into<String>,
        declared_total_size: Option<u64>,
        total_parts: u32,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            original_filename: original_filename.into(),
            declared_total_size,
            total_parts,
            parts_received: BTreeSet::new(),
            state: UploadState::Receiving,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a received part index.
    pub fn record_part(&mut self, part_index: u32) {
        self.parts_received.insert(part_index);
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Transition to a new state.
    pub fn transition(&mut self, state: UploadState) {
        self.state = state;
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Part indices in `0..total_parts` not yet recorded.
    pub fn missing_parts(&self) -> Vec<u32> {
        (0..self.total_parts)
            .filter(|i| !self.parts_received.contains(i))
            .collect()
    }
}

/// Metadata fields accompanying each part-upload request.
///
/// A request lacking `part_index` is a simple (non-chunked) upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Upload identifier.
    pub upload_id: UploadId,
    /// 0-based part sequence number.
    pub part_index: Option<u32>,
    /// Number of parts expected for this upload.
    pub total_parts: Option<u32>,
    /// Client-declared total file size in bytes.
    pub total_file_size: Option<u64>,
    /// User-supplied filename.
    pub filename: String,
}

impl ChunkMeta {
    /// Whether this request belongs to a chunked upload.
    pub fn is_chunked(&self) -> bool {
        self.part_index.is_some()
    }

    /// Validate the declared part bounds.
    pub fn validate(&self) -> crate::Result<()> {
        if let (Some(index), Some(total)) = (self.part_index, self.total_parts) {
            if total == 0 || index >= total {
                return Err(crate::Error::InvalidPartIndex { index, total });
            }
            if total > crate::MAX_TOTAL_PARTS {
                return Err(crate::Error::TooManyParts {
                    declared: total,
                    max: crate::MAX_TOTAL_PARTS,
                });
            }
        }
        Ok(())
    }
}

/// Response body for upload, finish, and delete requests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When true, the client must not automatically retry this failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevent_retry: Option<bool>,
    /// Optional thumbnail location for the stored file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl UploadResponse {
    /// A plain success response.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// A failure response with a reason.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// A failure the client must not retry.
    pub fn failure_no_retry(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            prevent_retry: Some(true),
            ..Default::default()
        }
    }
}

/// Sanitize a user-supplied filename for filesystem use.
///
/// Takes the final path component and rejects names that would resolve
/// outside a per-upload directory.
pub fn sanitize_filename(name: &str) -> crate::Result<String> {
    let trimmed = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(crate::Error::InvalidFilename(name.to_string()));
    }
    if trimmed.contains('\0') {
        return Err(crate::Error::InvalidFilename(name.to_string()));
    }

    Ok(trimmed.to_string())
}
