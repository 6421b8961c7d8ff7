//! Integration tests for the admin surface and health endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::fixtures::seed_android_update;
use common::server::TestServer;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn request(
    server: &TestServer,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let response = server
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn admin_routes_require_the_secret_when_configured() {
    let server = TestServer::with_admin_secret("s3cret").await;

    let (status, body) = request(&server, "GET", "/api/admin/updates", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authorization header required");

    let (status, body) =
        request(&server, "GET", "/api/admin/updates", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid admin token");

    let (status, _) = request(&server, "GET", "/api/admin/updates", None, Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn empty_secret_leaves_admin_routes_open() {
    let server = TestServer::new().await;
    let (status, _) = request(&server, "GET", "/api/admin/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_keys_with_admin_scope_are_accepted_as_bearers() {
    let server = TestServer::with_admin_secret("s3cret").await;

    let (admin_key, _) = server
        .store()
        .create_api_key("ci", &["admin".to_string()])
        .await
        .unwrap();
    let (reader_key, _) = server
        .store()
        .create_api_key("reader", &["read".to_string()])
        .await
        .unwrap();

    let (status, _) =
        request(&server, "GET", "/api/admin/updates", None, Some(&admin_key)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        request(&server, "GET", "/api/admin/updates", None, Some(&reader_key)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_never_gated() {
    let server = TestServer::with_admin_secret("s3cret").await;

    let (status, body) = request(&server, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"]["database"], "ok");
    assert_eq!(body["services"]["cloudinary"], "not configured");
    assert_eq!(body["services"]["signing"], "ok");

    let without_db = TestServer::without_store().await;
    let (_, body) = request(&without_db, "GET", "/api/health", None, None).await;
    assert_eq!(body["services"]["database"], "not configured");
}

#[tokio::test]
async fn preflight_requests_short_circuit() {
    let server = TestServer::with_admin_secret("s3cret").await;

    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/admin/updates")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert!(headers
        .get("access-control-allow-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("expo-protocol-version"));
    assert!(headers
        .get("access-control-expose-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("expo-signature"));
}

// =============================================================================
// Updates
// =============================================================================

#[tokio::test]
async fn lists_updates_newest_first_with_paging() {
    let server = TestServer::new().await;
    seed_android_update(&server.store(), "demo").await;
    seed_android_update(&server.store(), "demo").await;
    seed_android_update(&server.store(), "other").await;

    let (status, body) = request(&server, "GET", "/api/admin/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);

    let (_, body) = request(
        &server,
        "GET",
        "/api/admin/updates?project=demo&limit=1",
        None,
        None,
    )
    .await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["updates"].as_array().unwrap().len(), 1);
    assert_eq!(body["limit"], 1);
}

#[tokio::test]
async fn list_updates_without_store_reports_degraded_mode() {
    let server = TestServer::without_store().await;
    let (status, body) = request(&server, "GET", "/api/admin/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["message"].as_str().unwrap().contains("Database not connected"));
}

#[tokio::test]
async fn patch_toggles_activation_and_clamps_rollout() {
    let server = TestServer::new().await;
    let seeded = seed_android_update(&server.store(), "demo").await;

    let (status, _) = request(
        &server,
        "PATCH",
        &format!("/api/admin/updates/{}", seeded.id),
        Some(json!({ "isActive": false, "rolloutPercentage": 150 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let update = server.store().find_update(seeded.id).await.unwrap().unwrap();
    assert!(!update.is_active);
    assert_eq!(update.rollout_percentage, 100);

    let (status, _) = request(
        &server,
        "PATCH",
        &format!("/api/admin/updates/{}", seeded.id),
        Some(json!({ "rolloutPercentage": -5 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let update = server.store().find_update(seeded.id).await.unwrap().unwrap();
    assert_eq!(update.rollout_percentage, 0);
}

#[tokio::test]
async fn patch_rejects_empty_bodies_and_unknown_ids() {
    let server = TestServer::new().await;
    let seeded = seed_android_update(&server.store(), "demo").await;

    // Unknown fields are ignored; an effectively empty patch is an error.
    let (status, body) = request(
        &server,
        "PATCH",
        &format!("/api/admin/updates/{}", seeded.id),
        Some(json!({ "downloads": 9999 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No updates provided");

    let (status, _) = request(
        &server,
        "PATCH",
        &format!("/api/admin/updates/{}", uuid::Uuid::new_v4()),
        Some(json!({ "isActive": false })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(
        &server,
        "PATCH",
        "/api/admin/updates/not-a-uuid",
        Some(json!({ "isActive": false })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid update ID");
}

#[tokio::test]
async fn delete_removes_the_record() {
    let server = TestServer::new().await;
    let seeded = seed_android_update(&server.store(), "demo").await;

    let (status, _) = request(
        &server,
        "DELETE",
        &format!("/api/admin/updates/{}", seeded.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(server.store().find_update(seeded.id).await.unwrap().is_none());

    let (status, _) = request(
        &server,
        "DELETE",
        &format!("/api/admin/updates/{}", seeded.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Rollbacks
// =============================================================================

#[tokio::test]
async fn rollback_inherits_the_scope_of_the_referenced_update() {
    let server = TestServer::new().await;
    let seeded = seed_android_update(&server.store(), "demo").await;

    let (status, body) = request(
        &server,
        "POST",
        &format!("/api/admin/updates/{}/rollback", seeded.id),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let rollback = &body["rollback"];
    assert_eq!(rollback["projectSlug"], "demo");
    assert_eq!(rollback["runtimeVersion"], "1");
    assert_eq!(rollback["channel"], "production");
    assert_eq!(rollback["platform"], "all");
    assert_eq!(rollback["isRollback"], true);
    assert!(rollback.get("metadata").is_none());
    assert!(rollback.get("bundlePath").is_none());

    // The manifest endpoint now rolls clients back.
    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/demo/manifest")
                .header("expo-protocol-version", "1")
                .header("expo-platform", "android")
                .header("expo-runtime-version", "1")
                .header("expo-current-update-id", "A")
                .header("expo-embedded-update-id", "B")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#""type":"rollBackToEmbedded""#));
}

#[tokio::test]
async fn rollback_accepts_scope_overrides() {
    let server = TestServer::new().await;
    let seeded = seed_android_update(&server.store(), "demo").await;

    let (status, body) = request(
        &server,
        "POST",
        &format!(
            "/api/admin/updates/{}/rollback?runtimeVersion=7&channel=beta",
            seeded.id
        ),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rollback"]["runtimeVersion"], "7");
    assert_eq!(body["rollback"]["channel"], "beta");
}

// =============================================================================
// Projects
// =============================================================================

#[tokio::test]
async fn project_crud_round_trip() {
    let server = TestServer::new().await;

    let (status, body) = request(
        &server,
        "POST",
        "/api/admin/projects",
        Some(json!({ "slug": "demo", "name": "Demo App", "description": "test" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "demo");

    let (status, body) = request(
        &server,
        "POST",
        "/api/admin/projects",
        Some(json!({ "slug": "demo", "name": "Again" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    let (status, body) = request(
        &server,
        "POST",
        "/api/admin/projects",
        Some(json!({ "slug": "demo" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "slug and name are required");

    let (_, body) = request(&server, "GET", "/api/admin/projects", None, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["projects"][0]["name"], "Demo App");

    let (status, _) = request(&server, "DELETE", "/api/admin/projects/demo", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = request(&server, "GET", "/api/admin/projects", None, None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn deleting_a_project_cascades_to_its_updates() {
    let server = TestServer::new().await;
    server
        .store()
        .create_project("demo", "Demo", None)
        .await
        .unwrap();
    let seeded = seed_android_update(&server.store(), "demo").await;
    let other = seed_android_update(&server.store(), "other").await;

    let (status, _) = request(&server, "DELETE", "/api/admin/projects/demo", None, None).await;
    assert_eq!(status, StatusCode::OK);

    assert!(server.store().find_update(seeded.id).await.unwrap().is_none());
    assert!(server.store().find_update(other.id).await.unwrap().is_some());
}

// =============================================================================
// Stats
// =============================================================================

#[tokio::test]
async fn stats_report_zeroes_then_counts() {
    let server = TestServer::new().await;

    let (status, body) = request(&server, "GET", "/api/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalDownloads"], 0);

    let seeded = seed_android_update(&server.store(), "demo").await;
    server
        .store()
        .log_download(airlift_metadata::models::NewDownload {
            update_id: seeded.id,
            platform: "android".to_string(),
            success: true,
            device_hash: None,
        })
        .await
        .unwrap();

    let (_, body) = request(&server, "GET", "/api/admin/stats", None, None).await;
    assert_eq!(body["totalDownloads"], 1);
    assert_eq!(body["byPlatform"]["android"], 1);
    assert_eq!(body["byChannel"]["production"], 1);
}

#[tokio::test]
async fn stats_without_store_report_neutral_zeroes() {
    let server = TestServer::without_store().await;
    let (status, body) = request(&server, "GET", "/api/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalDownloads"], 0);
    assert_eq!(body["message"], "Database not connected.");
}

// =============================================================================
// API keys
// =============================================================================

#[tokio::test]
async fn api_key_management_round_trip() {
    let server = TestServer::new().await;

    let (status, body) = request(
        &server,
        "POST",
        "/api/admin/keys",
        Some(json!({ "name": "ci", "scopes": ["read", "write"] })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let plaintext = body["key"].as_str().unwrap();
    assert!(plaintext.starts_with("ota_"));
    assert_eq!(body["apiKey"]["prefix"], plaintext[..8]);
    assert!(body["apiKey"].get("keyHash").is_none());

    let (_, body) = request(&server, "GET", "/api/admin/keys", None, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["keys"][0]["name"], "ci");
    assert!(body["keys"][0].get("keyHash").is_none());

    let id = body["keys"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = request(
        &server,
        "DELETE",
        &format!("/api/admin/keys/{id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&server, "GET", "/api/admin/keys", None, None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn api_key_creation_validates_the_body() {
    let server = TestServer::new().await;
    let (status, body) = request(
        &server,
        "POST",
        "/api/admin/keys",
        Some(json!({ "name": "ci" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name and scopes are required");

    // An explicitly empty scope list is as invalid as a missing one.
    let (status, body) = request(
        &server,
        "POST",
        "/api/admin/keys",
        Some(json!({ "name": "ci", "scopes": [] })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name and scopes are required");
}
