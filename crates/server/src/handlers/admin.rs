//! Admin endpoints: projects, updates, API keys, stats, rollbacks.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use airlift_metadata::models::{NewUpdate, UpdateFilter, UpdatePatch};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Deadline for read operations.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for deletes, which may cascade.
const DELETE_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for best-effort CDN folder sweeps, detached from the request.
const CDN_SWEEP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| ApiError::Internal("operation timed out".to_string()))?
}

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid update ID".to_string()))
}

/// The CDN folder an update's tree was uploaded under.
fn cdn_folder(runtime_version: &str, update_id: &str) -> String {
    format!("updates/{runtime_version}/{update_id}")
}

/// Kick off a best-effort CDN folder sweep; failures are logged, never
/// surfaced to the admin response.
fn spawn_cdn_sweep(state: &AppState, folder: String) {
    let Some(cdn) = state.cdn.clone() else {
        return;
    };
    tokio::spawn(async move {
        let sweep = tokio::time::timeout(CDN_SWEEP_TIMEOUT, cdn.delete_folder(&folder)).await;
        match sweep {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(folder = %folder, error = %e, "CDN folder sweep failed"),
            Err(_) => tracing::warn!(folder = %folder, "CDN folder sweep timed out"),
        }
    });
}

// =============================================================================
// Updates
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListUpdatesQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    project: Option<String>,
    channel: Option<String>,
    #[serde(rename = "runtimeVersion")]
    runtime_version: Option<String>,
}

/// GET /api/admin/updates - list updates, newest first.
pub async fn list_updates(
    State(state): State<AppState>,
    Query(query): Query<ListUpdatesQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(store) = &state.store else {
        return Ok(Json(json!({
            "updates": [],
            "total": 0,
            "message": "Database not connected. Updates are served from filesystem.",
        })));
    };

    let limit = query.limit.filter(|l| *l > 0).unwrap_or(50);
    let offset = query.offset.filter(|o| *o >= 0).unwrap_or(0);
    let filter = UpdateFilter {
        project_slug: query.project.filter(|s| !s.is_empty()),
        channel: query.channel.filter(|s| !s.is_empty()),
        runtime_version: query.runtime_version.filter(|s| !s.is_empty()),
    };

    let (updates, total) = with_deadline(READ_TIMEOUT, async {
        Ok(store.list_updates(&filter, limit, offset).await?)
    })
    .await?;

    Ok(Json(json!({
        "updates": updates,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PatchUpdateBody {
    #[serde(rename = "isActive")]
    is_active: Option<bool>,
    #[serde(rename = "rolloutPercentage")]
    rollout_percentage: Option<i64>,
}

/// PATCH /api/admin/updates/{id} - toggle activation or adjust rollout.
/// Anything else in the body is ignored.
pub async fn patch_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchUpdateBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = state.require_store()?;
    let id = parse_id(&id)?;

    if body.is_active.is_none() && body.rollout_percentage.is_none() {
        return Err(ApiError::BadRequest("No updates provided".to_string()));
    }

    let patch = UpdatePatch {
        is_active: body.is_active,
        rollout_percentage: body.rollout_percentage,
    };
    with_deadline(READ_TIMEOUT, async {
        Ok(store.patch_update(id, &patch).await?)
    })
    .await?;

    Ok(Json(json!({
        "message": "Update modified successfully",
        "id": id,
    })))
}

/// DELETE /api/admin/updates/{id} - remove an update and sweep its CDN
/// folder in the background.
pub async fn delete_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let store = state.require_store()?;
    let id = parse_id(&id)?;

    let update = with_deadline(DELETE_TIMEOUT, async {
        store
            .find_update(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Update not found".to_string()))
    })
    .await?;

    with_deadline(DELETE_TIMEOUT, async {
        Ok(store.delete_update(id).await?)
    })
    .await?;

    if let Err(e) = store.adjust_update_count(&update.project_slug, -1).await {
        tracing::debug!(error = %e, "update count adjustment failed");
    }

    spawn_cdn_sweep(
        &state,
        cdn_folder(&update.runtime_version, &update.update_id),
    );

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct RollbackQuery {
    #[serde(rename = "runtimeVersion")]
    runtime_version: Option<String>,
    channel: Option<String>,
}

/// POST /api/admin/updates/{id}/rollback - point clients of this update's
/// scope back at their embedded build.
///
/// The rollback inherits project, runtime, and channel from the referenced
/// update; the query may override runtime and channel. The record carries
/// no metadata and no bundle path.
pub async fn create_rollback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RollbackQuery>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let store = state.require_store()?;
    let id = parse_id(&id)?;

    let previous = with_deadline(READ_TIMEOUT, async {
        store
            .find_update(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Update not found".to_string()))
    })
    .await?;

    let rollback = with_deadline(READ_TIMEOUT, async {
        Ok(store
            .create_update(NewUpdate {
                project_slug: previous.project_slug.clone(),
                update_id: String::new(),
                runtime_version: query
                    .runtime_version
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| previous.runtime_version.clone()),
                channel: query
                    .channel
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| previous.channel.clone()),
                platform: "all".to_string(),
                bundle_path: None,
                rollout_percentage: None,
                is_rollback: true,
                metadata: None,
                created_at: None,
            })
            .await?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Rollback created successfully",
            "previousId": id,
            "rollback": rollback,
        })),
    ))
}

// =============================================================================
// Projects
// =============================================================================

/// GET /api/admin/projects
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let Some(store) = &state.store else {
        return Ok(Json(json!({ "projects": [], "total": 0 })));
    };

    let projects = with_deadline(READ_TIMEOUT, async {
        Ok(store.list_projects().await?)
    })
    .await?;

    Ok(Json(json!({
        "total": projects.len(),
        "projects": projects,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
    slug: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

/// POST /api/admin/projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectBody>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let store = state.require_store()?;

    let slug = body.slug.filter(|s| !s.is_empty());
    let name = body.name.filter(|n| !n.is_empty());
    let (Some(slug), Some(name)) = (slug, name) else {
        return Err(ApiError::BadRequest("slug and name are required".to_string()));
    };

    let project = with_deadline(READ_TIMEOUT, async {
        Ok(store
            .create_project(&slug, &name, body.description.as_deref())
            .await?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(serde_json::to_value(project)?)))
}

/// DELETE /api/admin/projects/{slug} - cascade: updates rows go now, their
/// CDN folders in the background.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    let store = state.require_store()?;
    if slug.is_empty() {
        return Err(ApiError::BadRequest("Project slug is required".to_string()));
    }

    let filter = UpdateFilter {
        project_slug: Some(slug.clone()),
        ..Default::default()
    };
    let (updates, _) = with_deadline(DELETE_TIMEOUT, async {
        Ok(store.list_updates(&filter, 1000, 0).await?)
    })
    .await?;

    for update in &updates {
        spawn_cdn_sweep(
            &state,
            cdn_folder(&update.runtime_version, &update.update_id),
        );
    }

    with_deadline(DELETE_TIMEOUT, async {
        store.delete_updates_by_project(&slug).await?;
        store.delete_project(&slug).await?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::OK)
}

// =============================================================================
// Stats
// =============================================================================

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let Some(store) = &state.store else {
        return Ok(Json(json!({
            "totalDownloads": 0,
            "todayDownloads": 0,
            "weekDownloads": 0,
            "byPlatform": { "android": 0, "ios": 0 },
            "byChannel": { "production": 0, "staging": 0, "beta": 0 },
            "byRuntimeVersion": {},
            "message": "Database not connected.",
        })));
    };

    let summary = with_deadline(READ_TIMEOUT, async {
        Ok(store.download_summary().await?)
    })
    .await?;

    Ok(Json(serde_json::to_value(summary)?))
}

// =============================================================================
// API keys
// =============================================================================

/// GET /api/admin/keys
pub async fn list_api_keys(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let store = state.require_store()?;
    let keys = with_deadline(READ_TIMEOUT, async {
        Ok(store.list_api_keys().await?)
    })
    .await?;

    Ok(Json(json!({
        "total": keys.len(),
        "keys": keys,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyBody {
    name: Option<String>,
    scopes: Option<Vec<String>>,
}

/// POST /api/admin/keys - mint a key; the plaintext appears in this reply
/// and never again.
pub async fn create_api_key(
    State(state): State<AppState>,
    Json(body): Json<CreateApiKeyBody>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let store = state.require_store()?;

    let name = body.name.filter(|n| !n.is_empty());
    let scopes = body.scopes.filter(|s| !s.is_empty());
    let (Some(name), Some(scopes)) = (name, scopes) else {
        return Err(ApiError::BadRequest("name and scopes are required".to_string()));
    };

    let (plaintext, record) = with_deadline(READ_TIMEOUT, async {
        Ok(store.create_api_key(&name, &scopes).await?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "key": plaintext,
            "apiKey": record,
        })),
    ))
}

/// DELETE /api/admin/keys/{id}
pub async fn delete_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let store = state.require_store()?;
    let id =
        Uuid::parse_str(&id).map_err(|_| ApiError::BadRequest("Invalid key ID".to_string()))?;

    with_deadline(DELETE_TIMEOUT, async {
        Ok(store.delete_api_key(id).await?)
    })
    .await?;

    Ok(StatusCode::OK)
}
