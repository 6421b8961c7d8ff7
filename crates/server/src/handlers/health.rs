//! Health endpoint. Never gated.

use crate::state::AppState;
use airlift_core::manifest::format_commit_time;
use axum::Json;
use axum::extract::State;
use serde_json::json;
use time::OffsetDateTime;

/// GET /api/health - service status report for load balancers and the
/// self-ping keepalive.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match &state.store {
        Some(store) => match store.health_check().await {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {e}"),
        },
        None => "not configured".to_string(),
    };

    let cloudinary = match &state.cdn {
        Some(cdn) => {
            if cdn.health().await {
                "ok"
            } else {
                "error"
            }
        }
        None => "not configured",
    };

    Json(json!({
        "status": "ok",
        "version": state.version,
        "timestamp": format_commit_time(OffsetDateTime::now_utc()),
        "services": {
            "database": database,
            "cloudinary": cloudinary,
            "signing": "ok",
        },
    }))
}
