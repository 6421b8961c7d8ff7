//! Asset serving endpoint.
//!
//! Serves update files to Expo clients: either a 302 to the CDN copy
//! (counting launch-asset downloads on the way) or a stream of local bytes.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use airlift_core::content_type;
use airlift_metadata::models::NewDownload;
use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::path::{Component, Path};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AssetQuery {
    asset: Option<String>,
    platform: Option<String>,
    #[serde(rename = "runtimeVersion")]
    runtime_version: Option<String>,
    redirect: Option<String>,
    #[serde(rename = "updateId")]
    update_id: Option<String>,
    #[serde(rename = "isLaunchAsset")]
    is_launch_asset: Option<String>,
}

/// GET /api/assets - serve one asset.
pub async fn get_asset(
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
) -> ApiResult<Response> {
    handle_asset(state, query).await
}

/// GET /api/{projectSlug}/assets - scoped alias; the slug is not needed to
/// resolve an asset and is ignored.
pub async fn get_asset_scoped(
    State(state): State<AppState>,
    UrlPath(_project_slug): UrlPath<String>,
    Query(query): Query<AssetQuery>,
) -> ApiResult<Response> {
    handle_asset(state, query).await
}

async fn handle_asset(state: AppState, query: AssetQuery) -> ApiResult<Response> {
    // CDN-backed assets redirect. Launch-asset fetches are the adoption
    // metric: count them in the background, never blocking the redirect.
    if let Some(redirect) = query.redirect.as_deref().filter(|r| !r.is_empty()) {
        if query.is_launch_asset.as_deref() == Some("true")
            && let Some(id) = query.update_id.as_deref().and_then(|v| Uuid::parse_str(v).ok())
            && let Some(store) = &state.store
        {
            let store = store.clone();
            let platform = query.platform.clone().unwrap_or_default();
            tokio::spawn(async move {
                if let Err(e) = store.increment_downloads(id).await {
                    tracing::debug!(error = %e, "download counter write failed");
                }
                if let Err(e) = store
                    .log_download(NewDownload {
                        update_id: id,
                        platform,
                        success: true,
                        device_hash: None,
                    })
                    .await
                {
                    tracing::debug!(error = %e, "download log write failed");
                }
            });
        }

        return Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, redirect)
            .body(Body::empty())
            .map_err(|e| ApiError::Internal(format!("response assembly: {e}")));
    }

    let asset_name = query
        .asset
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No asset name provided.".to_string()))?;

    let platform = query.platform.as_deref().unwrap_or_default();
    if platform != "ios" && platform != "android" {
        return Err(ApiError::BadRequest(
            "No platform provided. Expected \"ios\" or \"android\".".to_string(),
        ));
    }

    if query
        .runtime_version
        .as_deref()
        .filter(|v| !v.is_empty())
        .is_none()
    {
        return Err(ApiError::BadRequest("No runtimeVersion provided.".to_string()));
    }

    // Asset paths resolve inside the updates directory only.
    let rel = Path::new(asset_name);
    let escapes = rel.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ApiError::BadRequest("Invalid asset path.".to_string()));
    }

    let asset_path = state.config.server.updates_dir.join(rel);
    let metadata = match tokio::fs::metadata(&asset_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            return Err(ApiError::NotFound(format!(
                "Asset \"{asset_name}\" does not exist."
            )));
        }
    };

    let file = tokio::fs::File::open(&asset_path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to open asset: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type::for_path(asset_name))
        .header(CONTENT_LENGTH, metadata.len())
        .header(CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(format!("response assembly: {e}")))
}

/// 404 body for any unknown /api path, kept JSON-shaped like every other
/// error reply.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": "Not found" })),
    )
        .into_response()
}
