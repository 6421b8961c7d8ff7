//! Cross-origin resource sharing for browser dashboards and Expo clients.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const ALLOW_METHODS: &str = "GET, POST, PATCH, DELETE, OPTIONS";

/// Every request header the Expo client or the dashboard sends.
const ALLOW_HEADERS: &str = "Origin, Content-Type, Authorization, expo-platform, \
     expo-runtime-version, expo-channel-name, expo-protocol-version, \
     expo-expect-signature, expo-current-update-id, expo-embedded-update-id, \
     eas-client-id";

const EXPOSE_HEADERS: &str = "expo-protocol-version, expo-sfv-version, expo-signature";

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        "access-control-expose-headers",
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
}

/// Middleware adding CORS headers to every response; preflight requests
/// short-circuit with 204.
pub async fn cors_middleware(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    response
}
