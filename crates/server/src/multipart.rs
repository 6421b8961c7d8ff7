//! Single-part multipart writer for protocol replies.
//!
//! Every manifest and directive goes out as a one-part multipart document.
//! The part framing follows the form-data conventions the Expo client
//! parses, while the top-level Content-Type is pinned to `multipart/mixed`.

use uuid::Uuid;

/// A rendered multipart body and its boundary.
pub struct ProtocolBody {
    pub boundary: String,
    pub bytes: Vec<u8>,
}

impl ProtocolBody {
    /// The full Content-Type header value for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }
}

/// Render a single JSON part named `manifest` or `directive`, with an
/// optional `expo-signature` part header.
pub fn single_part(name: &str, body: &[u8], signature: Option<&str>) -> ProtocolBody {
    let boundary = format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );

    let mut bytes = Vec::with_capacity(body.len() + 256);
    bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    bytes.extend_from_slice(b"Content-Type: application/json\r\n");
    bytes.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
    );
    if let Some(signature) = signature {
        bytes.extend_from_slice(format!("expo-signature: {signature}\r\n").as_bytes());
    }
    bytes.extend_from_slice(b"\r\n");
    bytes.extend_from_slice(body);
    bytes.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    ProtocolBody { boundary, bytes }
}
