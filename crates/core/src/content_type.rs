//! MIME type inference for update assets.

/// MIME type for a file extension (without the leading dot).
/// Unknown extensions map to `application/octet-stream`.
pub fn from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        // JavaScript bundles (plain and Hermes bytecode)
        "js" | "hbc" | "bundle" => "application/javascript",

        "json" => "application/json",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",

        // Fonts
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",

        _ => "application/octet-stream",
    }
}

/// MIME type for a file path, keyed on its extension.
pub fn for_path(path: &str) -> &'static str {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    from_extension(ext)
}

/// Whether an extension denotes an image type.
pub fn is_image_extension(ext: &str) -> bool {
    from_extension(ext).starts_with("image/")
}
