//! API key repository.

use crate::error::MetadataResult;
use crate::models::ApiKeyRecord;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for admin API keys.
#[async_trait]
pub trait ApiKeyRepo: Send + Sync {
    /// Generate and store a new key. Returns the plaintext (the only time it
    /// is visible) and the stored record.
    async fn create_api_key(
        &self,
        name: &str,
        scopes: &[String],
    ) -> MetadataResult<(String, ApiKeyRecord)>;

    /// Look up a key by its plaintext, comparing hashes. Callers update
    /// `last_used_at` asynchronously via [`ApiKeyRepo::touch_api_key`].
    async fn validate_api_key(&self, plaintext: &str) -> MetadataResult<Option<ApiKeyRecord>>;

    /// Record when a key was last used.
    async fn touch_api_key(&self, id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()>;

    /// All keys, newest first. Hashes are never serialized.
    async fn list_api_keys(&self) -> MetadataResult<Vec<ApiKeyRecord>>;

    /// Remove a key.
    async fn delete_api_key(&self, id: Uuid) -> MetadataResult<()>;
}
