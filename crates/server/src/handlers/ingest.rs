//! Update ingestion pipeline.
//!
//! A publisher POSTs a zipped `expo export` build; the pipeline unpacks it,
//! normalizes the tree, hashes every file, offloads the tree to the CDN
//! when one is configured, and inserts the canonical update record.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use airlift_core::{bundle, hash};
use airlift_metadata::models::NewUpdate;
use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ingestion deadline; covers unpacking, hashing, and the CDN upload.
const INGEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct IngestForm {
    project_slug: String,
    update_id: String,
    runtime_version: String,
    channel: String,
    platform: String,
    rollout_percentage: Option<i64>,
    bundle: Option<Vec<u8>>,
}

/// POST /api/admin/updates - register a new update from a bundle ZIP.
pub async fn register_update(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    tokio::time::timeout(INGEST_TIMEOUT, ingest(state, multipart))
        .await
        .map_err(|_| ApiError::Internal("ingestion timed out".to_string()))?
}

async fn parse_form(mut multipart: Multipart) -> ApiResult<IngestForm> {
    let mut form = IngestForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to parse form: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "bundle" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read bundle: {e}")))?;
                form.bundle = Some(data.to_vec());
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to parse form: {e}")))?;
                match name.as_str() {
                    "projectSlug" => form.project_slug = value,
                    "updateId" => form.update_id = value,
                    "runtimeVersion" => form.runtime_version = value,
                    "channel" => form.channel = value,
                    "platform" => form.platform = value,
                    "rolloutPercentage" => {
                        if !value.is_empty() {
                            let parsed = value.parse().map_err(|_| {
                                ApiError::BadRequest(
                                    "rolloutPercentage must be an integer".to_string(),
                                )
                            })?;
                            form.rollout_percentage = Some(parsed);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

async fn ingest(
    state: AppState,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let store = state.require_store()?.clone();

    let form = parse_form(multipart).await?;

    if form.project_slug.is_empty() || form.runtime_version.is_empty() {
        return Err(ApiError::BadRequest(
            "projectSlug and runtimeVersion are required".to_string(),
        ));
    }
    let bundle_bytes = form
        .bundle
        .ok_or_else(|| ApiError::BadRequest("Bundle file is required".to_string()))?;

    let update_id = if form.update_id.is_empty() {
        hash::new_update_id()
    } else {
        form.update_id
    };

    // Everything on-disk lives in a scratch directory released on every
    // exit path once the record is in.
    let scratch = tempfile::tempdir()?;
    let zip_path = scratch.path().join("bundle.zip");
    tokio::fs::write(&zip_path, &bundle_bytes).await?;

    let extract_dir = scratch.path().join("extracted");
    let (root, mut metadata) = {
        let zip_path = zip_path.clone();
        let extract_dir = extract_dir.clone();
        tokio::task::spawn_blocking(move || -> airlift_core::Result<_> {
            let root = bundle::unpack_bundle(&zip_path, &extract_dir)?;
            let mut metadata = bundle::load_metadata(&root)?;
            bundle::hash_contents(&root, &mut metadata)?;
            Ok((root, metadata))
        })
        .await
        .map_err(|e| ApiError::Internal(format!("unpack task failed: {e}")))??
    };

    store
        .ensure_project(&form.project_slug, &form.project_slug)
        .await?;

    // CDN offload. A failed upload is logged but never rolls back the
    // record; assets without a URL fall through to local serving.
    if let Some(cdn) = &state.cdn {
        let folder = format!("updates/{}/{update_id}", form.runtime_version);
        match cdn.upload_dir(&folder, &root).await {
            Ok(url_map) => {
                for platform in metadata.file_metadata.values_mut() {
                    if let Some(url) = url_map.get(&platform.bundle) {
                        platform.bundle_url = url.clone();
                    }
                    for asset in &mut platform.assets {
                        if let Some(url) = url_map.get(&asset.path) {
                            asset.url = url.clone();
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, folder = %folder, "CDN upload failed, serving locally");
            }
        }
    }

    // Without a CDN the bundle tree has to outlive the scratch directory:
    // merge it into the updates directory. Bundle and asset file names are
    // content addressed and cannot collide; the root metadata files are
    // not, and stay behind (they are already captured on the record).
    let bundle_path = if state.cdn.is_none() {
        let updates_dir = state.config.server.updates_dir.clone();
        let root = root.clone();
        let dir = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            merge_update_tree(&root, &updates_dir)?;
            Ok(updates_dir)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("persist task failed: {e}")))??;
        Some(dir.to_string_lossy().into_owned())
    } else {
        None
    };

    let record = store
        .create_update(NewUpdate {
            project_slug: form.project_slug.clone(),
            update_id,
            runtime_version: form.runtime_version,
            channel: form.channel,
            platform: form.platform,
            bundle_path,
            rollout_percentage: form.rollout_percentage,
            is_rollback: false,
            metadata: Some(metadata),
            created_at: None,
        })
        .await?;

    if let Err(e) = store.adjust_update_count(&form.project_slug, 1).await {
        tracing::debug!(error = %e, "update count adjustment failed");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Update registered successfully",
            "update": record,
        })),
    ))
}

/// Merge an unpacked export into the shared updates directory.
///
/// The root `metadata.json` and `expoConfig.json` are skipped: they are not
/// content addressed, so copying them would overwrite whatever a previous
/// ingest left there, and their contents already live on the update record.
fn merge_update_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == bundle::METADATA_FILE || name == bundle::EXPO_CONFIG_FILE {
            continue;
        }
        let target = dest.join(&name);
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Recursively copy `src` into `dest`, creating directories as needed and
/// overwriting files that already exist.
fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
