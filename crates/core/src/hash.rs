//! Content addressing for update bundles and assets.
//!
//! Every file in an update is addressed two ways from a single SHA-256
//! digest: a 32-character truncated hex `key` and a base64url (no padding)
//! `hash`. Client-visible update ids are UUID-shaped strings; they carry no
//! RFC 4122 version or variant bits.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute the SHA-256 digest of `data` as 64 lowercase hex characters.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the SHA-256 digest of `data` as URL-safe base64 without padding.
pub fn sha256_base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

/// Compute the `(key, hash)` content address of `data`.
///
/// `key` is the first 32 hex characters of the SHA-256 digest; `hash` is the
/// same digest encoded as base64url without padding. Both derive from one
/// digest computation.
pub fn content_address(data: &[u8]) -> (String, String) {
    let digest = Sha256::digest(data);
    let key = hex::encode(&digest[..16]);
    let hash = URL_SAFE_NO_PAD.encode(digest);
    (key, hash)
}

/// Format the first 32 characters of a hex string as a UUID-shaped id
/// (8-4-4-4-12). Inputs shorter than 32 characters are returned unchanged.
pub fn uuid_from_hex(hex: &str) -> String {
    if hex.len() < 32 {
        return hex.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Generate a fresh client-visible update id.
pub fn new_update_id() -> String {
    Uuid::new_v4().to_string()
}
