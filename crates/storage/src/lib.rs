//! Object storage and upload reassembly for stow.
//!
//! This crate provides:
//! - An object store abstraction with atomic writes
//! - A local filesystem backend with path traversal protection
//! - The chunk store: part persistence, reassembly, and cleanup

pub mod backends;
pub mod chunks;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use chunks::ChunkStore;
pub use error::{StorageError, StorageResult};
pub use traits::{ObjectMeta, ObjectStore, StreamingUpload};

use std::sync::Arc;
use stow_core::config::StorageConfig;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
