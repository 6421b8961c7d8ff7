//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use airlift_core::UpdateMetadata;
use airlift_core::manifest::format_commit_time;
use serde::{Serialize, Serializer};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

fn serialize_commit_time<S: Serializer>(ts: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_commit_time(*ts))
}

fn serialize_opt_commit_time<S: Serializer>(
    ts: &Option<OffsetDateTime>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => s.serialize_str(&format_commit_time(*ts)),
        None => s.serialize_none(),
    }
}

// =============================================================================
// Updates
// =============================================================================

/// Raw updates table row. The metadata document is stored as JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct UpdateRow {
    pub id: Uuid,
    pub project_slug: String,
    pub update_id: String,
    pub runtime_version: String,
    pub channel: String,
    pub platform: String,
    pub bundle_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub is_active: bool,
    pub is_rollback: bool,
    pub rollout_percentage: i64,
    pub downloads: i64,
    pub metadata: Option<String>,
}

/// An OTA update with its metadata document decoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    pub id: Uuid,
    pub project_slug: String,
    /// Client-visible update identifier (UUID-shaped).
    pub update_id: String,
    pub runtime_version: String,
    pub channel: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<String>,
    #[serde(serialize_with = "serialize_commit_time")]
    pub created_at: OffsetDateTime,
    pub is_active: bool,
    pub is_rollback: bool,
    pub rollout_percentage: i64,
    pub downloads: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UpdateMetadata>,
}

impl TryFrom<UpdateRow> for UpdateRecord {
    type Error = MetadataError;

    fn try_from(row: UpdateRow) -> MetadataResult<Self> {
        let metadata = row
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| MetadataError::Serialization(format!("update metadata: {e}")))?;

        Ok(Self {
            id: row.id,
            project_slug: row.project_slug,
            update_id: row.update_id,
            runtime_version: row.runtime_version,
            channel: row.channel,
            platform: row.platform,
            bundle_path: row.bundle_path,
            created_at: row.created_at,
            is_active: row.is_active,
            is_rollback: row.is_rollback,
            rollout_percentage: row.rollout_percentage,
            downloads: row.downloads,
            metadata,
        })
    }
}

/// Fields for inserting a new update.
#[derive(Debug, Clone, Default)]
pub struct NewUpdate {
    pub project_slug: String,
    pub update_id: String,
    pub runtime_version: String,
    /// Empty defaults to "production".
    pub channel: String,
    /// Empty defaults to "all".
    pub platform: String,
    pub bundle_path: Option<String>,
    /// None defaults to 100; values are clamped to 0-100.
    pub rollout_percentage: Option<i64>,
    pub is_rollback: bool,
    pub metadata: Option<UpdateMetadata>,
    /// None defaults to the insertion time.
    pub created_at: Option<OffsetDateTime>,
}

/// Filters for listing updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateFilter {
    pub project_slug: Option<String>,
    pub channel: Option<String>,
    pub runtime_version: Option<String>,
}

/// Mutable update fields. Anything not listed here is immutable after
/// insertion (apart from the download counter).
#[derive(Debug, Clone, Default)]
pub struct UpdatePatch {
    pub is_active: Option<bool>,
    pub rollout_percentage: Option<i64>,
}

// =============================================================================
// Projects
// =============================================================================

/// An Expo app project. Auto-created on first upload of its slug.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(serialize_with = "serialize_commit_time")]
    pub created_at: OffsetDateTime,
    /// Cached update count; may lag behind the updates table.
    pub update_count: i64,
}

// =============================================================================
// API keys
// =============================================================================

/// Raw api_keys table row. Scopes are stored as a JSON array.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRow {
    pub id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub prefix: String,
    pub scopes: String,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
}

/// An access key for the admin API. Only the SHA-256 of the plaintext is
/// ever persisted; the plaintext is returned exactly once, at creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// First 8 characters of the plaintext, retained for display.
    pub prefix: String,
    pub scopes: Vec<String>,
    #[serde(serialize_with = "serialize_commit_time")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "serialize_opt_commit_time")]
    pub last_used_at: Option<OffsetDateTime>,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = MetadataError;

    fn try_from(row: ApiKeyRow) -> MetadataResult<Self> {
        let scopes = serde_json::from_str(&row.scopes)
            .map_err(|e| MetadataError::Serialization(format!("api key scopes: {e}")))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            key_hash: row.key_hash,
            prefix: row.prefix,
            scopes,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        })
    }
}

// =============================================================================
// Download analytics
// =============================================================================

/// A single download event, appended when a launch asset is fetched.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: Uuid,
    /// Internal id of the downloaded update.
    pub update_id: Uuid,
    pub platform: String,
    #[serde(serialize_with = "serialize_commit_time")]
    pub timestamp: OffsetDateTime,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_hash: Option<String>,
}

/// Fields for logging a download event.
#[derive(Debug, Clone)]
pub struct NewDownload {
    pub update_id: Uuid,
    pub platform: String,
    pub success: bool,
    pub device_hash: Option<String>,
}

/// Aggregated download statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    pub total_downloads: i64,
    pub today_downloads: i64,
    pub week_downloads: i64,
    pub by_platform: std::collections::HashMap<String, i64>,
    pub by_channel: std::collections::HashMap<String, i64>,
    pub by_runtime_version: std::collections::HashMap<String, i64>,
}
