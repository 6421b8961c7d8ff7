//! Update repository.

use crate::error::MetadataResult;
use crate::models::{NewUpdate, UpdateFilter, UpdatePatch, UpdateRecord};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for update records.
#[async_trait]
pub trait UpdateRepo: Send + Sync {
    /// Insert a new update. Assigns a stable id, defaults the rollout to 100
    /// when unset, the channel to production when empty, and `created_at` to
    /// now when unset.
    async fn create_update(&self, update: NewUpdate) -> MetadataResult<UpdateRecord>;

    /// The newest active update matching (project, runtime, channel) whose
    /// platform is the requested one or "all".
    async fn find_latest(
        &self,
        project_slug: &str,
        runtime_version: &str,
        channel: &str,
        platform: &str,
    ) -> MetadataResult<Option<UpdateRecord>>;

    /// Look up by internal id.
    async fn find_update(&self, id: Uuid) -> MetadataResult<Option<UpdateRecord>>;

    /// Look up by client-visible update id.
    async fn find_update_by_update_id(
        &self,
        update_id: &str,
    ) -> MetadataResult<Option<UpdateRecord>>;

    /// List updates newest-first with the given filters; returns the page
    /// and the total match count.
    async fn list_updates(
        &self,
        filter: &UpdateFilter,
        limit: i64,
        offset: i64,
    ) -> MetadataResult<(Vec<UpdateRecord>, i64)>;

    /// Apply a patch. Rollout percentages are clamped to 0-100.
    async fn patch_update(&self, id: Uuid, patch: &UpdatePatch) -> MetadataResult<()>;

    /// Permanently remove an update.
    async fn delete_update(&self, id: Uuid) -> MetadataResult<()>;

    /// Remove every update belonging to a project; returns the count.
    async fn delete_updates_by_project(&self, project_slug: &str) -> MetadataResult<u64>;

    /// Bump the download counter. Callers treat this as fire-and-forget.
    async fn increment_downloads(&self, id: Uuid) -> MetadataResult<()>;
}
