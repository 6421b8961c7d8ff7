//! Metadata store for the Airlift OTA update server.
//!
//! This crate provides:
//! - Persistent records for updates, projects, API keys, and download events
//! - Queries keyed by (project, runtime, channel, platform)
//! - A SQLite implementation behind a repository-trait bundle

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{AnalyticsRepo, ApiKeyRepo, ProjectRepo, UpdateRepo};
pub use store::{MetadataStore, SqliteStore};

use airlift_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }
    }
}
