//! Core domain types and shared logic for the Airlift OTA update server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content addressing (SHA-256 keys, base64url hashes, UUID-shaped ids)
//! - Update metadata parsed from Expo export bundles
//! - Manifest and directive wire types for the Expo update protocol
//! - Percentage rollout gating
//! - Bundle unpacking and normalization
//! - Configuration types

pub mod bundle;
pub mod config;
pub mod content_type;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod metadata;
pub mod rollout;

pub use error::{Error, Result};
pub use manifest::{Directive, ManifestAsset, ManifestExtra, UpdateManifest};
pub use metadata::{AssetEntry, PlatformMetadata, UpdateMetadata};
pub use rollout::RolloutGate;

/// Default maximum size for an uploaded bundle ZIP: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Channel assigned to updates when the publisher omits one.
pub const CHANNEL_PRODUCTION: &str = "production";

/// Platform value matching every requested platform.
pub const PLATFORM_ALL: &str = "all";
