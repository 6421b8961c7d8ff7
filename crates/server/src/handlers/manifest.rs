//! Manifest negotiation endpoint.
//!
//! Implements the Expo update protocol state machine: a poll is answered
//! with a full manifest, a rollback directive, or "no update available",
//! framed as a single-part multipart reply and optionally signed.

use crate::error::{ApiError, ApiResult};
use crate::multipart;
use crate::state::AppState;
use airlift_core::manifest::{
    Directive, ManifestAsset, ManifestExtra, RollbackParameters, UpdateManifest,
    format_commit_time,
};
use airlift_core::metadata::AssetEntry;
use airlift_core::{content_type, hash};
use airlift_metadata::models::UpdateRecord;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;

/// Characters percent-encoded inside query parameter values. Keeps dots and
/// dashes readable while escaping separators.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'=');

/// Query-parameter fallbacks for clients that cannot set headers.
#[derive(Debug, Deserialize)]
pub struct ManifestQuery {
    platform: Option<String>,
    #[serde(rename = "runtime-version")]
    runtime_version: Option<String>,
}

/// GET /api/{projectSlug}/manifest - the Expo client poll.
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(project_slug): Path<String>,
    Query(query): Query<ManifestQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    handle_manifest(state, Some(project_slug), query, headers).await
}

/// GET /api/manifest - legacy unscoped route; kept wired for backward
/// compatibility diagnostics, always fails on the missing slug.
pub async fn get_manifest_unscoped(
    State(state): State<AppState>,
    Query(query): Query<ManifestQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    handle_manifest(state, None, query, headers).await
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn handle_manifest(
    state: AppState,
    project_slug: Option<String>,
    query: ManifestQuery,
    headers: HeaderMap,
) -> ApiResult<Response> {
    // Missing or garbled protocol versions mean protocol 0.
    let protocol_version: i32 = header(&headers, "expo-protocol-version")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let platform = header(&headers, "expo-platform")
        .map(str::to_string)
        .or(query.platform)
        .unwrap_or_default();
    if platform != "ios" && platform != "android" {
        return Err(ApiError::BadRequest(
            "Unsupported platform. Expected either ios or android.".to_string(),
        ));
    }

    let runtime_version = header(&headers, "expo-runtime-version")
        .map(str::to_string)
        .or(query.runtime_version)
        .unwrap_or_default();
    if runtime_version.is_empty() {
        return Err(ApiError::BadRequest("No runtimeVersion provided.".to_string()));
    }

    let channel = header(&headers, "expo-channel-name").unwrap_or("production");
    let current_update_id = header(&headers, "expo-current-update-id").unwrap_or("");

    let project_slug = project_slug
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Project slug is required".to_string()))?;

    tracing::info!(
        project = %project_slug,
        runtime = %runtime_version,
        platform = %platform,
        channel = %channel,
        "manifest request"
    );

    let store = state.require_store()?;

    let update = store
        .find_latest(&project_slug, &runtime_version, channel, &platform)
        .await
        .unwrap_or(None);

    let Some(update) = update else {
        return no_update_available(&state, &headers, protocol_version);
    };

    if update.is_rollback {
        let embedded_update_id = header(&headers, "expo-embedded-update-id").unwrap_or("");
        if current_update_id == embedded_update_id {
            return no_update_available(&state, &headers, protocol_version);
        }

        let directive = Directive::RollBackToEmbedded {
            parameters: RollbackParameters {
                commit_time: format_commit_time(update.created_at),
            },
        };
        let body = serde_json::to_vec(&directive)
            .map_err(|e| ApiError::Internal(format!("directive encoding: {e}")))?;
        return protocol_response(&state, &headers, protocol_version, "directive", &body);
    }

    // Staged rollout gating. Devices that identify themselves bucket
    // deterministically; the rest take the random path.
    if update.rollout_percentage < 100 {
        let fingerprint = header(&headers, "eas-client-id").unwrap_or("");
        if !state
            .rollout
            .should_serve(update.rollout_percentage, fingerprint)
        {
            return no_update_available(&state, &headers, protocol_version);
        }
    }

    if current_update_id == update.update_id && protocol_version == 1 {
        return no_update_available(&state, &headers, protocol_version);
    }

    let manifest = build_manifest(&state, &update, &runtime_version, &platform).await?;
    let body = serde_json::to_vec(&manifest)
        .map_err(|e| ApiError::Internal(format!("manifest encoding: {e}")))?;
    protocol_response(&state, &headers, protocol_version, "manifest", &body)
}

async fn build_manifest(
    state: &AppState,
    update: &UpdateRecord,
    runtime_version: &str,
    platform: &str,
) -> ApiResult<UpdateManifest> {
    let metadata = update
        .metadata
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Update metadata missing".to_string()))?;

    let platform_metadata = metadata
        .file_metadata
        .get(platform)
        .ok_or_else(|| ApiError::Internal("No metadata for platform".to_string()))?;

    let mut assets = Vec::with_capacity(platform_metadata.assets.len());
    for entry in &platform_metadata.assets {
        match asset_info(state, update, entry, runtime_version, platform).await {
            Ok(asset) => assets.push(asset),
            // An unreadable ordinary asset is dropped from the manifest;
            // the launch asset below stays fatal.
            Err(e) => tracing::warn!(path = %entry.path, error = %e, "skipping unreadable asset"),
        }
    }

    let launch_entry = AssetEntry {
        path: platform_metadata.bundle.clone(),
        ext: String::new(),
        url: platform_metadata.bundle_url.clone(),
        key: platform_metadata.bundle_key.clone(),
        hash: platform_metadata.bundle_hash.clone(),
    };
    let launch_asset = launch_asset_info(state, update, &launch_entry, runtime_version, platform)
        .await
        .map_err(|_| ApiError::Internal("Failed to get launch asset".to_string()))?;

    let expo_client = match &metadata.expo_config {
        Some(config) => Some(config.clone()),
        None => read_expo_config_fallback(update).await,
    };

    Ok(UpdateManifest {
        id: update.update_id.clone(),
        created_at: format_commit_time(update.created_at),
        runtime_version: runtime_version.to_string(),
        assets,
        launch_asset,
        metadata: json!({}),
        extra: ManifestExtra { expo_client },
    })
}

/// Asset description for an ordinary asset: stored content address when the
/// ingestion pipeline filled one, file hashing as a legacy fallback.
async fn asset_info(
    state: &AppState,
    update: &UpdateRecord,
    entry: &AssetEntry,
    runtime_version: &str,
    platform: &str,
) -> ApiResult<ManifestAsset> {
    let url = build_asset_url(
        state,
        &entry.path,
        runtime_version,
        platform,
        &entry.url,
        false,
        None,
    );

    let (key, hash) = stored_or_computed_address(update, entry).await?;

    Ok(ManifestAsset {
        hash,
        key,
        file_extension: format!(".{}", entry.ext),
        content_type: content_type::from_extension(&entry.ext).to_string(),
        url,
    })
}

/// The launch bundle always reports `.bundle` / JavaScript, and its URL
/// carries the accounting parameters.
async fn launch_asset_info(
    state: &AppState,
    update: &UpdateRecord,
    entry: &AssetEntry,
    runtime_version: &str,
    platform: &str,
) -> ApiResult<ManifestAsset> {
    let url = build_asset_url(
        state,
        &entry.path,
        runtime_version,
        platform,
        &entry.url,
        true,
        Some(update.id.to_string()),
    );

    let (key, hash) = stored_or_computed_address(update, entry).await?;

    Ok(ManifestAsset {
        hash,
        key,
        file_extension: ".bundle".to_string(),
        content_type: "application/javascript".to_string(),
        url,
    })
}

async fn stored_or_computed_address(
    update: &UpdateRecord,
    entry: &AssetEntry,
) -> ApiResult<(String, String)> {
    if !entry.key.is_empty() && !entry.hash.is_empty() {
        return Ok((entry.key.clone(), entry.hash.clone()));
    }

    let bundle_path = update
        .bundle_path
        .as_deref()
        .ok_or_else(|| ApiError::Internal("no stored hash and no local bundle".to_string()))?;
    let full_path = std::path::Path::new(bundle_path).join(&entry.path);
    let data = tokio::fs::read(&full_path)
        .await
        .map_err(|e| ApiError::Internal(format!("asset read failed: {e}")))?;
    Ok(hash::content_address(&data))
}

/// Per-asset URLs always point at this server's asset endpoint so download
/// counting and access control stay central; any CDN location rides along
/// as the `redirect` parameter.
fn build_asset_url(
    state: &AppState,
    rel_path: &str,
    runtime_version: &str,
    platform: &str,
    redirect: &str,
    is_launch_asset: bool,
    update_record_id: Option<String>,
) -> String {
    let hostname = &state.config.server.hostname;
    let mut url = format!(
        "{hostname}/api/assets?asset={}&runtimeVersion={}&platform={platform}",
        utf8_percent_encode(rel_path, QUERY_VALUE),
        utf8_percent_encode(runtime_version, QUERY_VALUE),
    );

    if !redirect.is_empty() {
        url.push_str(&format!(
            "&redirect={}",
            utf8_percent_encode(redirect, QUERY_VALUE)
        ));
    }
    if is_launch_asset {
        url.push_str("&isLaunchAsset=true");
    }
    if let Some(id) = update_record_id {
        url.push_str(&format!("&updateId={id}"));
    }

    url
}

/// Legacy fallback: read `expoConfig.json` next to the stored bundle when
/// the record predates config capture at ingestion.
async fn read_expo_config_fallback(update: &UpdateRecord) -> Option<serde_json::Value> {
    let bundle_path = update.bundle_path.as_deref()?;
    let path = std::path::Path::new(bundle_path).join("expoConfig.json");
    let data = tokio::fs::read(&path).await.ok()?;
    serde_json::from_slice(&data).ok()
}

/// The "no update" outcome: a 404 under protocol 0, a signed or unsigned
/// directive under protocol 1.
fn no_update_available(
    state: &AppState,
    headers: &HeaderMap,
    protocol_version: i32,
) -> ApiResult<Response> {
    if protocol_version == 0 {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No update available" })),
        )
            .into_response());
    }

    let body = serde_json::to_vec(&Directive::NoUpdateAvailable)
        .map_err(|e| ApiError::Internal(format!("directive encoding: {e}")))?;
    protocol_response(state, headers, protocol_version, "directive", &body)
}

/// Frame a manifest or directive as the protocol's multipart reply,
/// signing when the client asked for it and a key is loaded.
fn protocol_response(
    state: &AppState,
    headers: &HeaderMap,
    protocol_version: i32,
    part_name: &str,
    body: &[u8],
) -> ApiResult<Response> {
    let expects_signature = header(headers, "expo-expect-signature")
        .map(|v| !v.is_empty())
        .unwrap_or(false);

    let signature = match (&state.signer, expects_signature) {
        (Some(signer), true) => Some(signer.signature_header(body)?),
        _ => None,
    };

    let multipart_body = multipart::single_part(part_name, body, signature.as_deref());

    Response::builder()
        .status(StatusCode::OK)
        .header("expo-protocol-version", protocol_version.to_string())
        .header("expo-sfv-version", "0")
        .header(CACHE_CONTROL, "private, max-age=0")
        .header(CONTENT_TYPE, multipart_body.content_type())
        .body(Body::from(multipart_body.bytes))
        .map_err(|e| ApiError::Internal(format!("response assembly: {e}")))
}
