//! Unpacking and normalization of Expo export bundles.
//!
//! A publisher uploads the ZIP produced by `expo export`. Depending on how
//! the archive was created, `metadata.json` may sit at the root, inside a
//! single wrapping directory, or inside a `dist/` sub-directory; unpacking
//! normalizes all three layouts to the same tree.

use crate::error::{Error, Result};
use crate::hash::content_address;
use crate::metadata::UpdateMetadata;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the platform file map inside an export.
pub const METADATA_FILE: &str = "metadata.json";

/// Name of the optional expo configuration file inside an export.
pub const EXPO_CONFIG_FILE: &str = "expoConfig.json";

/// Extract a bundle ZIP into `dest` and return the normalized root, i.e.
/// the directory where `metadata.json` is expected to live.
pub fn unpack_bundle(zip_path: &Path, dest: &Path) -> Result<PathBuf> {
    let file = fs::File::open(zip_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::Archive(format!("invalid ZIP: {e}")))?;
    archive
        .extract(dest)
        .map_err(|e| Error::Archive(format!("extraction failed: {e}")))?;
    normalize_root(dest)
}

/// Apply the root-detection heuristics to an extracted tree:
/// a single top-level directory is entered; otherwise, when `metadata.json`
/// is absent at the root but present under `dist/`, `dist/` becomes the root.
pub fn normalize_root(extracted: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(extracted)?.collect::<std::io::Result<_>>()?;

    if entries.len() == 1 && entries[0].path().is_dir() {
        return Ok(entries[0].path());
    }

    if !extracted.join(METADATA_FILE).is_file() {
        let dist = extracted.join("dist");
        if dist.is_dir() && dist.join(METADATA_FILE).is_file() {
            return Ok(dist);
        }
    }

    Ok(extracted.to_path_buf())
}

/// Parse `metadata.json` (required) and `expoConfig.json` (optional) from a
/// normalized bundle root.
pub fn load_metadata(root: &Path) -> Result<UpdateMetadata> {
    let raw = fs::read(root.join(METADATA_FILE))
        .map_err(|e| Error::Metadata(format!("{METADATA_FILE}: {e}")))?;
    let mut metadata: UpdateMetadata = serde_json::from_slice(&raw)
        .map_err(|e| Error::Metadata(format!("{METADATA_FILE}: {e}")))?;

    if let Ok(raw) = fs::read(root.join(EXPO_CONFIG_FILE)) {
        match serde_json::from_slice(&raw) {
            Ok(config) => metadata.expo_config = Some(config),
            Err(e) => tracing::warn!(error = %e, "ignoring unparseable {EXPO_CONFIG_FILE}"),
        }
    }

    Ok(metadata)
}

/// Fill the content address of every launch bundle and asset in `metadata`
/// by hashing the file bytes under `root`. A file missing from disk is a
/// fatal ingestion error.
pub fn hash_contents(root: &Path, metadata: &mut UpdateMetadata) -> Result<()> {
    for platform in metadata.file_metadata.values_mut() {
        let bundle_bytes = read_listed_file(root, &platform.bundle)?;
        let (key, hash) = content_address(&bundle_bytes);
        platform.bundle_key = key;
        platform.bundle_hash = hash;

        for asset in &mut platform.assets {
            let bytes = read_listed_file(root, &asset.path)?;
            let (key, hash) = content_address(&bytes);
            asset.key = key;
            asset.hash = hash;
        }
    }
    Ok(())
}

fn read_listed_file(root: &Path, rel: &str) -> Result<Vec<u8>> {
    fs::read(root.join(rel)).map_err(|_| Error::MissingFile(rel.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
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

    const METADATA: &str = r#"{
        "fileMetadata": {
            "android": {
                "bundle": "bundles/android-a.js",
                "assets": [{ "path": "assets/one", "ext": "png" }]
            }
        }
    }"#;

    fn unpack_fixture(entries: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("bundle.zip");
        fs::write(&zip_path, build_zip(entries)).unwrap();
        let out = temp.path().join("extracted");
        let root = unpack_bundle(&zip_path, &out).unwrap();
        (temp, root)
    }

    #[test]
    fn unpacks_flat_layout() {
        let (_temp, root) = unpack_fixture(&[
            ("metadata.json", METADATA),
            ("bundles/android-a.js", "x"),
            ("assets/one", "asset"),
        ]);
        assert!(root.join(METADATA_FILE).is_file());
    }

    #[test]
    fn unpacks_wrapped_layout() {
        let (_temp, root) = unpack_fixture(&[
            ("build-xyz/metadata.json", METADATA),
            ("build-xyz/bundles/android-a.js", "x"),
            ("build-xyz/assets/one", "asset"),
        ]);
        assert!(root.ends_with("build-xyz"));
        assert!(root.join(METADATA_FILE).is_file());
    }

    #[test]
    fn unpacks_dist_layout() {
        let (_temp, root) = unpack_fixture(&[
            ("dist/metadata.json", METADATA),
            ("dist/bundles/android-a.js", "x"),
            ("dist/assets/one", "asset"),
            ("README.md", "notes"),
        ]);
        assert!(root.ends_with("dist"));
        assert!(root.join(METADATA_FILE).is_file());
    }

    #[test]
    fn all_layouts_normalize_to_the_same_tree() {
        let flat = unpack_fixture(&[
            ("metadata.json", METADATA),
            ("bundles/android-a.js", "x"),
            ("assets/one", "asset"),
        ]);
        let wrapped = unpack_fixture(&[
            ("wrap/metadata.json", METADATA),
            ("wrap/bundles/android-a.js", "x"),
            ("wrap/assets/one", "asset"),
        ]);
        let dist = unpack_fixture(&[
            ("dist/metadata.json", METADATA),
            ("dist/bundles/android-a.js", "x"),
            ("dist/assets/one", "asset"),
            ("stray.txt", ""),
        ]);

        for (_temp, root) in [&flat, &wrapped, &dist] {
            let mut meta = load_metadata(root).unwrap();
            hash_contents(root, &mut meta).unwrap();
            let android = &meta.file_metadata["android"];
            assert_eq!(android.bundle_key, "2d711642b726b04401627ca9fbac32f5");
            assert_eq!(
                android.bundle_hash,
                "LXEWQrcmsEQBYnyp-6wy9c3R3b7Lt1ZjzHH-lWnAbuw"
            );
        }
    }

    #[test]
    fn parses_expo_config_when_present() {
        let (_temp, root) = unpack_fixture(&[
            ("metadata.json", METADATA),
            ("expoConfig.json", r#"{"name":"demo","slug":"demo"}"#),
            ("bundles/android-a.js", "x"),
            ("assets/one", "asset"),
        ]);
        let meta = load_metadata(&root).unwrap();
        assert_eq!(meta.expo_config.unwrap()["slug"], "demo");
    }

    #[test]
    fn missing_listed_file_is_fatal() {
        let (_temp, root) = unpack_fixture(&[("metadata.json", METADATA)]);
        let mut meta = load_metadata(&root).unwrap();
        let err = hash_contents(&root, &mut meta).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }

    #[test]
    fn missing_metadata_is_an_error() {
        let (_temp, root) = unpack_fixture(&[("bundles/android-a.js", "x")]);
        assert!(matches!(load_metadata(&root), Err(Error::Metadata(_))));
    }
}
