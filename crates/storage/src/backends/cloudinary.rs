//! Cloudinary CDN backend.
//!
//! Talks to the Cloudinary REST API directly: signed uploads through the
//! upload endpoint, deletions through the admin endpoint (basic auth).
//! Request signatures use SHA-256, which Cloudinary accepts alongside the
//! legacy SHA-1 scheme.

use crate::error::{StorageError, StorageResult};
use crate::traits::{CdnStore, UploadedAsset};
use airlift_core::content_type::is_image_extension;
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary upload API response (fields we consume).
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    bytes: u64,
}

/// CDN store backed by Cloudinary.
pub struct CloudinaryBackend {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryBackend {
    /// Create a backend from credentials. All three values are required.
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> StorageResult<Self> {
        if cloud_name.is_empty() || api_key.is_empty() || api_secret.is_empty() {
            return Err(StorageError::Config(
                "cloud_name, api_key and api_secret are all required".to_string(),
            ));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            cloud_name,
            api_key,
            api_secret,
        })
    }

    /// Sign request parameters: sorted `k=v` pairs joined by `&`, the API
    /// secret appended, SHA-256, hex.
    fn sign_params(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let payload = format!("{}{}", to_sign.join("&"), self.api_secret);
        hex::encode(Sha256::digest(payload.as_bytes()))
    }

    /// The public id for a file: raw files keep their extension so the URL
    /// carries it; Cloudinary manages extensions for images.
    fn public_id(folder: &str, file_name: &str, is_image: bool) -> String {
        let name = if is_image {
            match file_name.rsplit_once('.') {
                Some((stem, _ext)) if !stem.is_empty() => stem,
                _ => file_name,
            }
        } else {
            file_name
        };
        if folder.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", folder.trim_end_matches('/'), name)
        }
    }

    async fn check_status(response: reqwest::Response) -> StorageResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Delete every resource of one type under a prefix.
    async fn delete_resources_by_prefix(
        &self,
        resource_type: &str,
        folder: &str,
    ) -> StorageResult<()> {
        let url = format!(
            "{API_BASE}/{}/resources/{resource_type}/upload",
            self.cloud_name
        );
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&[("prefix[]", folder)])
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CdnStore for CloudinaryBackend {
    async fn upload_file(&self, folder: &str, local_path: &Path) -> StorageResult<UploadedAsset> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StorageError::InvalidPath(format!("no file name: {}", local_path.display()))
            })?
            .to_string();

        let ext = local_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let is_image = is_image_extension(ext);
        let resource_type = if is_image { "image" } else { "raw" };
        let public_id = Self::public_id(folder, &file_name, is_image);

        let data = tokio::fs::read(local_path).await?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();

        let mut to_sign = BTreeMap::new();
        to_sign.insert("overwrite", "true".to_string());
        to_sign.insert("public_id", public_id.clone());
        to_sign.insert("timestamp", timestamp.clone());
        let signature = self.sign_params(&to_sign);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(file_name),
            )
            .text("public_id", public_id)
            .text("overwrite", "true")
            .text("timestamp", timestamp)
            .text("api_key", self.api_key.clone())
            .text("signature", signature);

        let url = format!("{API_BASE}/{}/{resource_type}/upload", self.cloud_name);
        let response = self.http.post(&url).multipart(form).send().await?;
        let response = Self::check_status(response).await?;
        let uploaded: UploadResponse = response.json().await?;

        Ok(UploadedAsset {
            public_id: uploaded.public_id,
            secure_url: uploaded.secure_url,
            bytes: uploaded.bytes,
        })
    }

    async fn upload_dir(
        &self,
        folder: &str,
        local_dir: &Path,
    ) -> StorageResult<HashMap<String, String>> {
        let files = {
            let root = local_dir.to_path_buf();
            tokio::task::spawn_blocking(move || collect_files(&root))
                .await
                .map_err(|e| StorageError::Config(format!("walk task failed: {e}")))??
        };

        let mut url_map = HashMap::new();
        for rel in files {
            let rel_slash = to_forward_slashes(&rel);
            let cloud_folder = match rel_slash.rsplit_once('/') {
                Some((parent, _)) => format!("{}/{}", folder.trim_end_matches('/'), parent),
                None => folder.trim_end_matches('/').to_string(),
            };

            match self.upload_file(&cloud_folder, &local_dir.join(&rel)).await {
                Ok(uploaded) => {
                    tracing::debug!(path = %rel_slash, url = %uploaded.secure_url, "uploaded asset");
                    url_map.insert(rel_slash, uploaded.secure_url);
                }
                Err(e) => {
                    tracing::warn!(path = %rel_slash, error = %e, "asset upload failed, skipping");
                }
            }
        }

        Ok(url_map)
    }

    async fn health(&self) -> bool {
        // A one-item authenticated listing exercises both connectivity and
        // credentials without touching any stored asset.
        let url = format!("{API_BASE}/{}/resources/raw/upload", self.cloud_name);
        match self
            .http
            .get(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&[("max_results", "1")])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "CDN health probe failed");
                false
            }
        }
    }

    async fn delete_folder(&self, folder: &str) -> StorageResult<()> {
        // Update trees hold both raw files (bundles, JSON) and images.
        self.delete_resources_by_prefix("raw", folder).await?;
        self.delete_resources_by_prefix("image", folder).await?;

        let url = format!("{API_BASE}/{}/folders/{folder}", self.cloud_name);
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await?;
        Self::check_status(response).await?;

        tracing::info!(folder = %folder, "deleted CDN folder");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}

/// Collect the relative paths of every file under `root`.
fn collect_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CloudinaryBackend {
        CloudinaryBackend::new(
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_missing_credentials() {
        assert!(matches!(
            CloudinaryBackend::new("demo".to_string(), String::new(), "s".to_string()),
            Err(StorageError::Config(_))
        ));
    }

    #[test]
    fn signature_is_sorted_and_hex() {
        let backend = backend();
        let mut params = BTreeMap::new();
        params.insert("timestamp", "100".to_string());
        params.insert("public_id", "updates/1/a".to_string());

        // sha256("public_id=updates/1/a&timestamp=100secret")
        let signature = backend.sign_params(&params);
        assert_eq!(signature.len(), 64);
        assert_eq!(
            signature,
            hex::encode(Sha256::digest(
                b"public_id=updates/1/a&timestamp=100secret"
            ))
        );
    }

    #[test]
    fn public_ids_keep_raw_extensions_and_strip_image_ones() {
        assert_eq!(
            CloudinaryBackend::public_id("updates/1/u", "android-a.js", false),
            "updates/1/u/android-a.js"
        );
        assert_eq!(
            CloudinaryBackend::public_id("updates/1/u", "icon.png", true),
            "updates/1/u/icon"
        );
        assert_eq!(CloudinaryBackend::public_id("", "hashfile", false), "hashfile");
    }

    #[test]
    fn collects_files_recursively_with_relative_paths() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("bundles")).unwrap();
        std::fs::create_dir_all(temp.path().join("assets")).unwrap();
        std::fs::write(temp.path().join("metadata.json"), "{}").unwrap();
        std::fs::write(temp.path().join("bundles/a.js"), "x").unwrap();
        std::fs::write(temp.path().join("assets/3f2c"), "img").unwrap();

        let files = collect_files(temp.path()).unwrap();
        let rels: Vec<String> = files.iter().map(|p| to_forward_slashes(p)).collect();
        assert_eq!(rels, vec!["assets/3f2c", "bundles/a.js", "metadata.json"]);
    }
}
