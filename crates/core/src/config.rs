//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata store settings. Absent means the server runs without a
    /// database; admin features degrade to 503s and neutral responses.
    #[serde(default)]
    pub metadata: Option<MetadataConfig>,

    /// CDN settings. Absent means assets are served from local storage.
    #[serde(default)]
    pub cdn: Option<CdnConfig>,

    /// Code signing settings. Absent means manifests go out unsigned.
    #[serde(default)]
    pub signing: Option<SigningConfig>,

    /// Admin authentication settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Create a test configuration with an open admin surface and no
    /// external services.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                hostname: "http://localhost:8080".to_string(),
                updates_dir: PathBuf::from("./updates"),
                max_upload_bytes: crate::DEFAULT_MAX_UPLOAD_BYTES,
            },
            metadata: None,
            cdn: None,
            signing: None,
            admin: AdminConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public base URL used to build absolute asset URLs in manifests.
    /// Asset URLs are built against this value rather than derived from the
    /// incoming request; derived URLs break behind mismatched ingress.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Directory holding locally served update trees.
    #[serde(default = "default_updates_dir")]
    pub updates_dir: PathBuf,

    /// Maximum accepted bundle upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Whether the configured hostname points at a public deployment,
    /// i.e. the self-ping keepalive should run.
    pub fn has_public_hostname(&self) -> bool {
        !self.hostname.is_empty()
            && !self.hostname.contains("localhost")
            && !self.hostname.contains("127.0.0.1")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            hostname: default_hostname(),
            updates_dir: default_updates_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_hostname() -> String {
    "http://localhost:8080".to_string()
}

fn default_updates_dir() -> PathBuf {
    PathBuf::from("./updates")
}

fn default_max_upload_bytes() -> usize {
    crate::DEFAULT_MAX_UPLOAD_BYTES
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite-backed store.
    Sqlite {
        /// Path to the database file.
        path: PathBuf,
    },
}

/// CDN (Cloudinary) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdnConfig {
    /// Cloudinary cloud name.
    pub cloud_name: String,
    /// API key.
    pub api_key: String,
    /// API secret.
    /// WARNING: Prefer env vars over storing secrets in config files.
    pub api_secret: String,
}

/// Code signing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Path to a PEM-encoded RSA private key (PKCS#8 or PKCS#1).
    pub private_key_path: PathBuf,
}

/// Admin surface configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer secret protecting `/api/admin`. Empty disables the check
    /// entirely (development mode).
    #[serde(default)]
    pub secret: String,
}
