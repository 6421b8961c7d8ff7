//! Update metadata parsed from Expo export bundles.
//!
//! Field names follow the JSON produced by `expo export` (`metadata.json`)
//! and are stored verbatim on the update record, enriched with content
//! addresses and CDN URLs during ingestion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parsed contents of `metadata.json` plus the optional `expoConfig.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadata {
    /// Per-platform file maps, keyed by platform name ("android", "ios").
    pub file_metadata: HashMap<String, PlatformMetadata>,

    /// The project's expo configuration, echoed to clients under the
    /// manifest's `extra.expoClient` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expo_config: Option<serde_json::Value>,
}

/// Platform-specific bundle information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetadata {
    /// Relative path of the launch bundle within the export.
    pub bundle: String,

    /// CDN URL of the launch bundle, when uploaded.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle_url: String,

    /// 32-character truncated hex SHA-256 of the bundle bytes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle_key: String,

    /// Base64url SHA-256 of the bundle bytes (client integrity check).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle_hash: String,

    /// Static assets referenced by the bundle, in export order.
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

/// A single asset file in the update bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Relative path within the export.
    pub path: String,

    /// File extension without the leading dot.
    pub ext: String,

    /// CDN URL, when uploaded.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// 32-character truncated hex SHA-256 of the asset bytes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    /// Base64url SHA-256 of the asset bytes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}
