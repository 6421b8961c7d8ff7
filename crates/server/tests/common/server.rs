//! Server test utilities.

use airlift_core::config::AppConfig;
use airlift_metadata::{MetadataStore, SqliteStore};
use airlift_server::{AppState, create_router};
use airlift_signer::ManifestSigner;
use std::path::Path;
use std::sync::Arc;
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
    /// Create a test server with a fresh SQLite store, a temp updates
    /// directory, no CDN, no signer, and an open admin surface.
    pub async fn new() -> Self {
        Self::build(true, String::new(), None).await
    }

    /// A server whose admin routes require the given bearer secret.
    pub async fn with_admin_secret(secret: &str) -> Self {
        Self::build(true, secret.to_string(), None).await
    }

    /// A server that signs protocol replies.
    pub async fn with_signer(signer: ManifestSigner) -> Self {
        Self::build(true, String::new(), Some(signer)).await
    }

    /// A server with no metadata store, for degraded-mode behavior.
    pub async fn without_store() -> Self {
        Self::build(false, String::new(), None).await
    }

    async fn build(with_store: bool, admin_secret: String, signer: Option<ManifestSigner>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let updates_dir = temp_dir.path().join("updates");
        std::fs::create_dir_all(&updates_dir).expect("Failed to create updates directory");

        let store: Option<Arc<dyn MetadataStore>> = if with_store {
            let db_path = temp_dir.path().join("metadata.db");
            Some(Arc::new(
                SqliteStore::new(&db_path)
                    .await
                    .expect("Failed to create metadata store"),
            ))
        } else {
            None
        };

        let mut config = AppConfig::for_testing();
        config.server.updates_dir = updates_dir;
        config.admin.secret = admin_secret;

        let state = AppState::new(config, store, None, signer);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata store.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.state.store.clone().expect("test server has no store")
    }

    /// The directory local assets are served from.
    pub fn updates_dir(&self) -> &Path {
        &self.state.config.server.updates_dir
    }
}
