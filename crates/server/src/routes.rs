//! Route configuration.

use crate::auth::admin_auth_middleware;
use crate::cors::cors_middleware;
use crate::handlers::{admin, assets, health, ingest, manifest};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Admin surface, gated by bearer auth (open when no secret is set).
    let admin_routes = Router::new()
        .route(
            "/projects",
            get(admin::list_projects).post(admin::create_project),
        )
        .route("/projects/{slug}", delete(admin::delete_project))
        .route(
            "/updates",
            get(admin::list_updates).post(ingest::register_update),
        )
        .route(
            "/updates/{id}",
            axum::routing::patch(admin::patch_update).delete(admin::delete_update),
        )
        .route("/updates/{id}/rollback", post(admin::create_rollback))
        .route("/stats", get(admin::get_stats))
        .route(
            "/keys",
            get(admin::list_api_keys).post(admin::create_api_key),
        )
        .route("/keys/{id}", delete(admin::delete_api_key))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    let max_upload_bytes = state.config.server.max_upload_bytes;

    Router::new()
        // Health check (intentionally unauthenticated for probes and the
        // self-ping keepalive)
        .route("/api/health", get(health::health_check))
        // Client endpoints (no auth - called by Expo apps)
        .route(
            "/api/{projectSlug}/manifest",
            get(manifest::get_manifest),
        )
        .route("/api/{projectSlug}/assets", get(assets::get_asset_scoped))
        .route("/api/assets", get(assets::get_asset))
        // Legacy unscoped manifest route; kept wired, always errors on the
        // missing slug
        .route("/api/manifest", get(manifest::get_manifest_unscoped))
        .nest("/api/admin", admin_routes)
        .fallback(assets::not_found)
        // Bundle uploads exceed axum's default body limit
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
