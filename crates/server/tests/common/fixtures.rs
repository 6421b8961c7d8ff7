//! Shared test fixtures: export ZIPs, seeded updates, multipart helpers.

use airlift_metadata::MetadataStore;
use airlift_metadata::models::{NewUpdate, UpdateRecord};
use std::io::Write;
use std::sync::Arc;
use zip::write::SimpleFileOptions;

/// Truncated hex key of sha256("x").
#[allow(dead_code)]
pub const X_KEY: &str = "2d711642b726b04401627ca9fbac32f5";

/// Base64url hash of sha256("x").
#[allow(dead_code)]
pub const X_HASH: &str = "LXEWQrcmsEQBYnyp-6wy9c3R3b7Lt1ZjzHH-lWnAbuw";

/// metadata.json describing one android bundle with content "x" and no assets.
#[allow(dead_code)]
pub const ANDROID_METADATA_JSON: &str = r#"{
    "fileMetadata": {
        "android": {
            "bundle": "bundles/android-a.js",
            "assets": []
        }
    }
}"#;

/// Build a ZIP archive from (path, contents) entries.
#[allow(dead_code)]
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut cursor);
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    cursor.into_inner()
}

/// A minimal valid export ZIP: one android bundle with content "x".
#[allow(dead_code)]
pub fn android_export_zip() -> Vec<u8> {
    build_zip(&[
        ("metadata.json", ANDROID_METADATA_JSON),
        ("bundles/android-a.js", "x"),
    ])
}

/// Encode a multipart/form-data request body with text fields and an
/// optional file field. Returns (content type, body).
#[allow(dead_code)]
pub fn multipart_form(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (String, Vec<u8>) {
    let boundary = "airlift-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/zip\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    (
        format!("multipart/form-data; boundary={boundary}"),
        body,
    )
}

/// Split a single-part protocol reply into its part headers and part body.
/// Panics on malformed framing, which is itself a test failure.
#[allow(dead_code)]
pub fn parse_single_part(content_type: &str, body: &str) -> (String, String) {
    let boundary = content_type
        .split("boundary=")
        .nth(1)
        .expect("no boundary in content type");
    let delimiter = format!("--{boundary}");

    let after_open = body
        .split(&format!("{delimiter}\r\n"))
        .nth(1)
        .expect("missing opening boundary");
    let part = after_open
        .split(&format!("\r\n{delimiter}--"))
        .next()
        .expect("missing closing boundary");

    let (headers, part_body) = part.split_once("\r\n\r\n").expect("missing header break");
    (headers.to_string(), part_body.to_string())
}

/// Insert an active android update for (slug, runtime "1", production) with
/// stored hashes for a bundle of content "x".
#[allow(dead_code)]
pub async fn seed_android_update(store: &Arc<dyn MetadataStore>, slug: &str) -> UpdateRecord {
    let metadata = serde_json::from_str(&format!(
        r#"{{
            "fileMetadata": {{
                "android": {{
                    "bundle": "bundles/android-a.js",
                    "bundleKey": "{X_KEY}",
                    "bundleHash": "{X_HASH}",
                    "assets": []
                }}
            }},
            "expoConfig": {{ "name": "demo", "slug": "{slug}" }}
        }}"#
    ))
    .unwrap();

    store
        .create_update(NewUpdate {
            project_slug: slug.to_string(),
            update_id: uuid::Uuid::new_v4().to_string(),
            runtime_version: "1".to_string(),
            channel: String::new(),
            platform: "android".to_string(),
            bundle_path: None,
            rollout_percentage: None,
            is_rollback: false,
            metadata: Some(metadata),
            created_at: None,
        })
        .await
        .unwrap()
}
