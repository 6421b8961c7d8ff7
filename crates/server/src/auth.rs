//! Admin authentication middleware.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use time::OffsetDateTime;

/// Scope required for an API key to act as an admin bearer.
const ADMIN_SCOPE: &str = "admin";

/// Extract a bearer token from the Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Middleware gating `/api/admin`.
///
/// An empty configured secret disables the check entirely (development
/// mode). Otherwise the bearer must equal the secret, or be a stored API
/// key carrying the `admin` scope; key usage timestamps are recorded off
/// the request path.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let secret = &state.config.admin.secret;
    if secret.is_empty() {
        return Ok(next.run(req).await);
    }

    if req.headers().get(AUTHORIZATION).is_none() {
        return Err(ApiError::Unauthorized(
            "Authorization header required".to_string(),
        ));
    }

    let token = extract_bearer_token(&req).ok_or_else(|| {
        ApiError::Unauthorized("Invalid authorization format. Expected 'Bearer <token>'".to_string())
    })?;

    if token == secret {
        return Ok(next.run(req).await);
    }

    if let Some(store) = &state.store
        && let Ok(Some(key)) = store.validate_api_key(token).await
        && key.scopes.iter().any(|s| s == ADMIN_SCOPE)
    {
        let store = store.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(key_id, OffsetDateTime::now_utc()).await {
                tracing::debug!(error = %e, "failed to record api key use");
            }
        });
        return Ok(next.run(req).await);
    }

    Err(ApiError::Unauthorized("Invalid admin token".to_string()))
}
