//! Server test utilities.

use std::sync::Arc;
use stow_core::config::{AppConfig, SecretKeyConfig, ServerConfig, SigningConfig, StorageConfig};
use stow_server::{AppState, create_router};
use stow_signer::{SecretKey, UploadSigner};
use stow_storage::{FilesystemBackend, ObjectStore};
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and a dummy signer.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        std::fs::create_dir_all(&storage_path).expect("Failed to create storage directory");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig {
            server: ServerConfig::default(),
            storage: StorageConfig::Filesystem {
                path: storage_path,
            },
            signing: Some(SigningConfig::for_testing()),
        };
        modifier(&mut config);

        let signer = config.signing.as_ref().map(|signing| {
            let SecretKeyConfig::Value { key } = &signing.secret_key else {
                panic!("test signing config must carry an inline key");
            };
            UploadSigner::new(
                SecretKey::from_str_trimmed(key).expect("Failed to build test secret key"),
                signing,
            )
        });

        let state = AppState::new(config, storage, signer);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }
}
