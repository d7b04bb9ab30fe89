//! Application state shared across handlers.

use std::sync::Arc;
use stow_core::config::AppConfig;
use stow_signer::UploadSigner;
use stow_storage::{ChunkStore, ObjectStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Chunk store for part persistence and reassembly.
    pub chunks: Arc<ChunkStore>,
    /// Upload signer (optional; without it the signature endpoint rejects).
    pub signer: Option<Arc<UploadSigner>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Validates the configuration, logging warnings for allowed but risky
    /// settings.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails with an error.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        signer: Option<UploadSigner>,
    ) -> Self {
        match config.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid configuration: {}", error);
            }
        }

        let chunks = Arc::new(ChunkStore::new(storage.clone()));

        Self {
            config: Arc::new(config),
            storage,
            chunks,
            signer: signer.map(Arc::new),
        }
    }
}
