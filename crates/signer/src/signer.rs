//! RSA-PKCS#1 v1.5 manifest signing.

use crate::error::{SignerError, SignerResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Key id advertised in signature headers. Clients hold the matching public
/// key out of band.
const KEY_ID: &str = "main";

/// Signs manifest and directive bodies with RSA-PKCS#1 v1.5 over SHA-256.
///
/// PKCS#1 v1.5 signing is deterministic, so the signer needs no interior
/// mutability and is freely shared across request tasks.
pub struct ManifestSigner {
    private_key: RsaPrivateKey,
}

impl ManifestSigner {
    /// Create a signer from an already-parsed private key.
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// Parse a PEM-encoded RSA private key, accepting PKCS#8 and falling
    /// back to PKCS#1.
    pub fn from_pem(pem: &str) -> SignerResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| SignerError::KeyParsing(format!("not PKCS#8 or PKCS#1 PEM: {e}")))?;
        Ok(Self::new(key))
    }

    /// Load a PEM-encoded RSA private key from disk.
    pub fn from_pem_file(path: impl AsRef<Path>) -> SignerResult<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// Generate a signer with a fresh 2048-bit key.
    ///
    /// **For testing only**; key generation is slow.
    pub fn generate() -> SignerResult<Self> {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| SignerError::Signing(format!("key generation failed: {e}")))?;
        Ok(Self::new(key))
    }

    /// Sign `data` and return the signature as standard base64 with padding.
    pub fn sign(&self, data: &[u8]) -> SignerResult<String> {
        let digest = Sha256::digest(data);
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(STANDARD.encode(signature))
    }

    /// Build the `expo-signature` structured-field header value for `data`:
    /// `sig="<base64>", keyid="main"`.
    pub fn signature_header(&self, data: &[u8]) -> SignerResult<String> {
        let sig = self.sign(data)?;
        Ok(format!(r#"sig="{sig}", keyid="{KEY_ID}""#))
    }

    /// The public half of the signing key.
    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// Verify a base64 signature over `data` against this signer's key.
    pub fn verify(&self, data: &[u8], signature_b64: &str) -> SignerResult<()> {
        let signature = STANDARD
            .decode(signature_b64)
            .map_err(|e| SignerError::KeyParsing(format!("invalid base64 signature: {e}")))?;
        let digest = Sha256::digest(data);
        self.public_key()
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
            .map_err(|_| SignerError::VerificationFailed)
    }
}

impl std::fmt::Debug for ManifestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ManifestSigner([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs8::EncodePrivateKey;

    fn test_signer() -> ManifestSigner {
        ManifestSigner::generate().unwrap()
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let signer = test_signer();
        let body = br#"{"type":"noUpdateAvailable"}"#;

        let sig = signer.sign(body).unwrap();
        signer.verify(body, &sig).unwrap();

        // A different body must not verify.
        assert!(matches!(
            signer.verify(b"tampered", &sig),
            Err(SignerError::VerificationFailed)
        ));
    }

    #[test]
    fn signature_is_standard_base64_with_padding() {
        let signer = test_signer();
        let sig = signer.sign(b"manifest").unwrap();
        // 2048-bit RSA -> 256 signature bytes -> 344 base64 chars ending in '='.
        assert_eq!(sig.len(), 344);
        assert!(sig.ends_with('='));
        assert!(!sig.contains('-') && !sig.contains('_'));
    }

    #[test]
    fn header_has_structured_field_shape() {
        let signer = test_signer();
        let header = signer.signature_header(b"manifest").unwrap();

        assert!(header.starts_with("sig=\""));
        assert!(header.ends_with("\", keyid=\"main\""));
        let sig = &header[5..header.len() - 16];
        assert!(
            sig.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = test_signer();
        assert_eq!(signer.sign(b"body").unwrap(), signer.sign(b"body").unwrap());
    }

    #[test]
    fn parses_pkcs8_pem() {
        let signer = test_signer();
        let pem = signer
            .private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let reloaded = ManifestSigner::from_pem(&pem).unwrap();
        let sig = reloaded.sign(b"body").unwrap();
        signer.verify(b"body", &sig).unwrap();
    }

    #[test]
    fn parses_pkcs1_pem() {
        let signer = test_signer();
        let pem = signer
            .private_key
            .to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let reloaded = ManifestSigner::from_pem(&pem).unwrap();
        let sig = reloaded.sign(b"body").unwrap();
        signer.verify(b"body", &sig).unwrap();
    }

    #[test]
    fn rejects_garbage_pem() {
        assert!(matches!(
            ManifestSigner::from_pem("not a key"),
            Err(SignerError::KeyParsing(_))
        ));
    }
}
