//! CDN object storage for the Airlift OTA update server.
//!
//! This crate provides:
//! - A capability trait for uploading update trees to a CDN and mapping
//!   local relative paths to public URLs
//! - A Cloudinary backend over its REST API
//!
//! The adapter is optional: without one, the server serves assets from
//! local storage.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::cloudinary::CloudinaryBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{CdnStore, UploadedAsset};

use airlift_core::config::CdnConfig;
use std::sync::Arc;

/// Create a CDN store from configuration.
pub fn from_config(config: &CdnConfig) -> StorageResult<Arc<dyn CdnStore>> {
    let backend = CloudinaryBackend::new(
        config.cloud_name.clone(),
        config.api_key.clone(),
        config.api_secret.clone(),
    )?;
    Ok(Arc::new(backend))
}
