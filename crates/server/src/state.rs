//! Application state shared across handlers.

use crate::error::{ApiError, ApiResult};
use airlift_core::RolloutGate;
use airlift_core::config::AppConfig;
use airlift_metadata::MetadataStore;
use airlift_signer::ManifestSigner;
use airlift_storage::CdnStore;
use std::sync::Arc;

/// Shared application state. Every service is initialized once at startup
/// and handed to handlers by reference; the store, CDN, and signer are all
/// optional and their absence degrades behavior instead of failing startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store; absent means admin features surface 503s.
    pub store: Option<Arc<dyn MetadataStore>>,
    /// CDN store; absent means assets are served from local storage.
    pub cdn: Option<Arc<dyn CdnStore>>,
    /// Manifest signer; absent means replies go out unsigned.
    pub signer: Option<Arc<ManifestSigner>>,
    /// Rollout gate for staged update delivery.
    pub rollout: Arc<RolloutGate>,
    /// Server version reported by the health endpoint.
    pub version: &'static str,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        store: Option<Arc<dyn MetadataStore>>,
        cdn: Option<Arc<dyn CdnStore>>,
        signer: Option<ManifestSigner>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            cdn,
            signer: signer.map(Arc::new),
            rollout: Arc::new(RolloutGate::new()),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// The metadata store, or the 503 every database-backed endpoint
    /// returns when none is connected.
    pub fn require_store(&self) -> ApiResult<&Arc<dyn MetadataStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Database not connected".to_string()))
    }
}
