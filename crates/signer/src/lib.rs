//! Manifest signing for the Airlift OTA update server.
//!
//! This crate provides:
//! - RSA private key loading (PKCS#8 or PKCS#1 PEM)
//! - RSA-PKCS#1 v1.5 SHA-256 signing of manifest and directive bodies
//! - `expo-signature` header formatting

pub mod error;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use signer::ManifestSigner;
