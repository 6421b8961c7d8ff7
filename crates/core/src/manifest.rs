//! Manifest and directive wire types for the Expo update protocol.

use serde::Serialize;
use time::OffsetDateTime;

/// One asset description inside a manifest reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    pub hash: String,
    pub key: String,
    pub file_extension: String,
    pub content_type: String,
    pub url: String,
}

/// The `extra` block of a manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestExtra {
    /// The project's expo configuration; serialized as `null` when absent.
    #[serde(rename = "expoClient")]
    pub expo_client: Option<serde_json::Value>,
}

/// A full update manifest, describing one shippable update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    pub id: String,
    /// Creation time, pre-formatted with millisecond precision.
    pub created_at: String,
    pub runtime_version: String,
    pub assets: Vec<ManifestAsset>,
    pub launch_asset: ManifestAsset,
    pub metadata: serde_json::Value,
    pub extra: ManifestExtra,
}

/// A non-manifest reply carrying a control verb.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Directive {
    #[serde(rename = "noUpdateAvailable")]
    NoUpdateAvailable,

    #[serde(rename = "rollBackToEmbedded")]
    RollBackToEmbedded { parameters: RollbackParameters },
}

/// Parameters of a `rollBackToEmbedded` directive.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackParameters {
    pub commit_time: String,
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.sssZ`, the shape the Expo
/// client expects for `createdAt` and rollback commit times.
pub fn format_commit_time(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.millisecond()
    )
}
