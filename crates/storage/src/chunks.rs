//! Part storage and reassembly.
//!
//! Layout under the object store root:
//! - `chunks/{upload_id}/{part_index}` - individual parts awaiting reassembly
//! - `uploads/{upload_id}/{filename}` - combined (or simple) uploads
//! - `sessions/{upload_id}.json` - session records for introspection
//!
//! The stored parts are the source of truth: reassembly always re-lists the
//! part directory rather than trusting the session record.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use stow_core::upload::{UploadId, UploadSession, UploadState};
use tracing::{debug, instrument, warn};

/// Stores upload parts and reassembles them into final files.
pub struct ChunkStore {
    store: Arc<dyn ObjectStore>,
}

impl ChunkStore {
    /// Create a chunk store on top of an object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Key of the combined (or simple) upload for `id`.
    pub fn final_key(id: &UploadId, filename: &str) -> String {
        format!("uploads/{id}/{filename}")
    }

    fn part_key(id: &UploadId, index: u32) -> String {
        format!("chunks/{id}/{index}")
    }

    fn parts_prefix(id: &UploadId) -> String {
        format!("chunks/{id}")
    }

    fn final_prefix(id: &UploadId) -> String {
        format!("uploads/{id}")
    }

    fn session_key(id: &UploadId) -> String {
        format!("sessions/{id}.json")
    }

    /// Persist one part of a chunked upload.
    ///
    /// Parts may arrive in any order and may be re-sent; a re-sent part
    /// overwrites the previous copy. The session record is updated on a
    /// best-effort basis, a failure there never loses the part.
    #[instrument(skip(self, data), fields(upload_id = %id, part_index, size = data.len()))]
    pub async fn store_part(
        &self,
        id: &UploadId,
        part_index: u32,
        total_parts: u32,
        filename: &str,
        declared_total_size: Option<u64>,
        data: Bytes,
    ) -> StorageResult<()> {
        if total_parts == 0 || part_index >= total_parts {
            return Err(StorageError::InvalidPartIndex {
                index: part_index,
                total: total_parts,
            });
        }

        self.store.put(&Self::part_key(id, part_index), data).await?;

        let mut session = match self.session(id).await? {
            Some(session) => session,
            None => UploadSession::new(*id, filename, declared_total_size, total_parts),
        };
        session.record_part(part_index);
        if let Err(e) = self.save_session(&session).await {
            warn!(upload_id = %id, error = %e, "failed to update session record");
        }

        Ok(())
    }

    /// Store a non-chunked upload directly at its final location.
    ///
    /// Returns the key the file landed at.
    #[instrument(skip(self, data), fields(upload_id = %id, filename, size = data.len()))]
    pub async fn store_simple(
        &self,
        id: &UploadId,
        filename: &str,
        data: Bytes,
    ) -> StorageResult<String> {
        let size = data.len() as u64;
        let key = Self::final_key(id, filename);
        self.store.put(&key, data).await?;

        let mut session = UploadSession::new(*id, filename, Some(size), 1);
        session.record_part(0);
        session.transition(UploadState::Complete);
        if let Err(e) = self.save_session(&session).await {
            warn!(upload_id = %id, error = %e, "failed to update session record");
        }

        Ok(key)
    }

    /// Reassemble the stored parts of `id` into the final file.
    ///
    /// Verifies that every index in `0..total_parts` is present before
    /// touching the destination; a gap fails with the missing indices and
    /// leaves everything in place for the client to re-send.
    ///
    /// Idempotent: calling again after a successful combine (parts purged,
    /// final file present) succeeds without rewriting anything.
    #[instrument(skip(self), fields(upload_id = %id, filename, total_parts))]
    pub async fn combine(
        &self,
        id: &UploadId,
        filename: &str,
        total_parts: u32,
    ) -> StorageResult<String> {
        // Bound the declared count before deriving anything from it; the
        // missing-part computation below is linear in `total_parts`.
        if total_parts == 0 || total_parts > stow_core::MAX_TOTAL_PARTS {
            return Err(StorageError::InvalidPartCount {
                declared: total_parts,
                max: stow_core::MAX_TOTAL_PARTS,
            });
        }

        let dest = Self::final_key(id, filename);
        let parts = self.stored_parts(id).await?;

        if parts.is_empty() && self.store.exists(&dest).await? {
            debug!(upload_id = %id, "already combined, nothing to do");
            return Ok(dest);
        }

        let missing: Vec<u32> = (0..total_parts)
            .filter(|i| !parts.contains_key(i))
            .collect();
        if !missing.is_empty() {
            return Err(StorageError::MissingParts { missing });
        }

        self.update_session(id, |s| s.transition(UploadState::Combining))
            .await;

        // Stream into a temp-backed upload; the destination only appears
        // once every part has been appended in index order.
        let mut upload = match self.store.put_stream(&dest).await {
            Ok(upload) => upload,
            Err(e) => {
                self.fail_session(id).await;
                return Err(e);
            }
        };
        for (_, part_key) in parts.range(0..total_parts) {
            let data = match self.store.get(part_key).await {
                Ok(data) => data,
                Err(e) => {
                    let _ = upload.abort().await;
                    self.fail_session(id).await;
                    return Err(e);
                }
            };
            if let Err(e) = upload.write(data).await {
                let _ = upload.abort().await;
                self.fail_session(id).await;
                return Err(e);
            }
        }
        let written = match upload.finish().await {
            Ok(written) => written,
            Err(e) => {
                self.fail_session(id).await;
                return Err(e);
            }
        };
        debug!(upload_id = %id, bytes = written, "combined upload");

        self.update_session(id, |s| s.transition(UploadState::Complete))
            .await;

        // The combined file is durable; leftover parts only waste space.
        if let Err(e) = self.store.delete_prefix(&Self::parts_prefix(id)).await {
            warn!(upload_id = %id, error = %e, "failed to purge parts after combine");
        }

        Ok(dest)
    }

    /// Remove everything belonging to an upload: parts, combined file, and
    /// the session record. Deleting an unknown upload succeeds.
    #[instrument(skip(self), fields(upload_id = %id))]
    pub async fn delete_upload(&self, id: &UploadId) -> StorageResult<()> {
        self.store.delete_prefix(&Self::parts_prefix(id)).await?;
        self.store.delete_prefix(&Self::final_prefix(id)).await?;

        match self.store.delete(&Self::session_key(id)).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Load the session record for an upload, if one exists.
    pub async fn session(&self, id: &UploadId) -> StorageResult<Option<UploadSession>> {
        match self.store.get(&Self::session_key(id)).await {
            Ok(data) => {
                let session = serde_json::from_slice(&data)
                    .map_err(|e| StorageError::Session(format!("corrupt session record: {e}")))?;
                Ok(Some(session))
            }
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_session(&self, session: &UploadSession) -> StorageResult<()> {
        let data = serde_json::to_vec(session)
            .map_err(|e| StorageError::Session(format!("unserializable session: {e}")))?;
        self.store
            .put(&Self::session_key(&session.id), Bytes::from(data))
            .await
    }

    /// Mark the session failed. The parts stay in place, so the client can
    /// re-send and retry the combine.
    async fn fail_session(&self, id: &UploadId) {
        self.update_session(id, |s| s.transition(UploadState::Failed))
            .await;
    }

    async fn update_session(&self, id: &UploadId, apply: impl FnOnce(&mut UploadSession)) {
        let result = async {
            if let Some(mut session) = self.session(id).await? {
                apply(&mut session);
                self.save_session(&session).await?;
            }
            Ok::<_, StorageError>(())
        }
        .await;

        if let Err(e) = result {
            warn!(upload_id = %id, error = %e, "failed to update session record");
        }
    }

    /// Map stored part indices to their keys.
    ///
    /// Indices come from the key's last path segment; entries that don't
    /// parse as integers (stray temp files) are ignored.
    async fn stored_parts(&self, id: &UploadId) -> StorageResult<BTreeMap<u32, String>> {
        let keys = self.store.list(&Self::parts_prefix(id)).await?;
        let mut parts = BTreeMap::new();
        for key in keys {
            if let Some(name) = key.rsplit('/').next()
                && let Ok(index) = name.parse::<u32>()
            {
                parts.insert(index, key);
            }
        }
        Ok(parts)
    }
}
