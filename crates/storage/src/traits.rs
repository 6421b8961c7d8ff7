//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// A single uploaded asset.
#[derive(Clone, Debug)]
pub struct UploadedAsset {
    /// Backend identifier of the stored object.
    pub public_id: String,
    /// Public HTTPS URL serving the object.
    pub secure_url: String,
    /// Stored size in bytes.
    pub bytes: u64,
}

/// CDN store abstraction for update trees.
///
/// One capability bundle with one concrete implementation; future backends
/// implement the same operations.
#[async_trait]
pub trait CdnStore: Send + Sync + 'static {
    /// Upload a single file into a logical folder and return its public URL.
    async fn upload_file(&self, folder: &str, local_path: &Path) -> StorageResult<UploadedAsset>;

    /// Upload a directory tree preserving relative paths. Returns a map
    /// from forward-slash relative path to public URL. Individual file
    /// failures are logged and skipped.
    async fn upload_dir(
        &self,
        folder: &str,
        local_dir: &Path,
    ) -> StorageResult<HashMap<String, String>>;

    /// Delete every asset under a folder prefix, then the folder itself.
    async fn delete_folder(&self, folder: &str) -> StorageResult<()>;

    /// Probe backend reachability and credentials. Returns false when the
    /// backend cannot currently serve uploads.
    async fn health(&self) -> bool;

    /// Static identifier of this backend, for logging and health reports.
    fn backend_name(&self) -> &'static str;
}
