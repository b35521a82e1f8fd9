//! RSA key material generation and PEM parsing.

use crate::error::TokenError;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use keyward_core::{ConfigError, KeyConfig, KeyMaterial};
use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding,
};
use rsa::pkcs8::der::{Document, SecretDocument};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Modulus size for principal key pairs.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// How long a generated key pair is considered current.
pub const DEFAULT_KEY_HORIZON_DAYS: i64 = 30;

const PKCS1_PRIVATE_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_PRIVATE_LABEL: &str = "PRIVATE KEY";
const PKCS1_PUBLIC_LABEL: &str = "RSA PUBLIC KEY";
const PKIX_PUBLIC_LABEL: &str = "PUBLIC KEY";

/// Produces fresh RSA key material with an expiration horizon.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    bits: usize,
    horizon: Duration,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            bits: DEFAULT_KEY_BITS,
            horizon: Duration::days(DEFAULT_KEY_HORIZON_DAYS),
        }
    }
}

impl KeyGenerator {
    /// Build a generator from configuration.
    pub fn from_config(cfg: &KeyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            bits: cfg.bits()?,
            horizon: cfg.horizon()?,
        })
    }

    /// Generate a new key pair.
    ///
    /// Either both PEM blocks are produced or an error is returned; there is
    /// no partial result to persist.
    pub fn generate(&self) -> Result<KeyMaterial, TokenError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, self.bits)
            .map_err(|e| TokenError::KeyGeneration(e.to_string()))?;

        let private_key_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| TokenError::KeyGeneration(e.to_string()))?
            .to_string();
        let public_key_pem = private_key
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| TokenError::KeyGeneration(e.to_string()))?;

        let created_at = Utc::now();
        tracing::debug!(bits = self.bits, "generated RSA key pair");

        Ok(KeyMaterial {
            private_key_pem,
            public_key_pem,
            created_at,
            expires_at: created_at + self.horizon,
        })
    }
}

/// Generate a 2048-bit key pair valid for 30 days.
pub fn generate_keypair() -> Result<KeyMaterial, TokenError> {
    KeyGenerator::default().generate()
}

/// Parse a PEM private key into a signing key.
///
/// Blocks labelled `RSA PRIVATE KEY` or `PRIVATE KEY` are accepted with either
/// a PKCS#1 or a PKCS#8 body.
pub fn parse_private_key_pem(private_key_pem: &str) -> Result<EncodingKey, TokenError> {
    let (label, der) = SecretDocument::from_pem(private_key_pem.trim())
        .map_err(|e| TokenError::Signing(format!("failed to decode private key PEM: {e}")))?;
    if label != PKCS1_PRIVATE_LABEL && label != PKCS8_PRIVATE_LABEL {
        return Err(TokenError::Signing(format!(
            "unexpected private key block type: {label}"
        )));
    }

    let private_key = RsaPrivateKey::from_pkcs1_der(der.as_bytes())
        .or_else(|_| RsaPrivateKey::from_pkcs8_der(der.as_bytes()))
        .map_err(|e| TokenError::Signing(format!("failed to parse private key: {e}")))?;
    let pkcs1 = private_key
        .to_pkcs1_der()
        .map_err(|e| TokenError::Signing(e.to_string()))?;

    Ok(EncodingKey::from_rsa_der(pkcs1.as_bytes()))
}

/// Parse a PEM public key into an RSA public key.
///
/// PKCS#1 is tried first, then PKIX (SubjectPublicKeyInfo). A PKIX key for
/// any algorithm other than RSA is rejected.
pub fn parse_public_key_pem(public_key_pem: &str) -> Result<RsaPublicKey, TokenError> {
    if public_key_pem.trim().is_empty() {
        return Err(TokenError::KeyNotFound);
    }

    let (label, der) = Document::from_pem(public_key_pem.trim())
        .map_err(|e| TokenError::KeyFormat(format!("failed to decode PEM block: {e}")))?;
    if label != PKCS1_PUBLIC_LABEL && label != PKIX_PUBLIC_LABEL {
        return Err(TokenError::KeyFormat(format!("invalid block type: {label}")));
    }

    RsaPublicKey::from_pkcs1_der(der.as_bytes())
        .or_else(|_| RsaPublicKey::from_public_key_der(der.as_bytes()))
        .map_err(|e| TokenError::KeyFormat(format!("not an RSA public key: {e}")))
}

/// Parse a PEM public key into a verification key.
pub fn decoding_key_from_pem(public_key_pem: &str) -> Result<DecodingKey, TokenError> {
    let public_key = parse_public_key_pem(public_key_pem)?;
    Ok(DecodingKey::from_rsa_raw_components(
        &public_key.n().to_bytes_be(),
        &public_key.e().to_bytes_be(),
    ))
}
