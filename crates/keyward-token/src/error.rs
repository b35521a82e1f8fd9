//! Error types for the token crate.

use thiserror::Error;

/// Errors that can occur while generating keys, signing or verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Failed to generate or serialize a key pair.
    #[error("failed to generate key pair: {0}")]
    KeyGeneration(String),

    /// The private key could not be decoded or the signing primitive failed.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// The public key is neither a PKCS#1 nor a PKIX RSA public key.
    #[error("invalid public key: {0}")]
    KeyFormat(String),

    /// The token declares a signing algorithm outside the RSA family.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not match the public key.
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// The expiration claim is missing, malformed or in the past.
    #[error("token has expired or carries no valid expiration")]
    TokenExpired,

    /// There is no public key to verify against.
    #[error("no key material on file")]
    KeyNotFound,

    /// The token or its claim set does not have the expected shape.
    #[error("malformed token claims: {0}")]
    MalformedClaims(String),
}

impl TokenError {
    /// Whether this failure happened while producing a token rather than
    /// while checking one presented by a caller.
    pub fn is_issuance_failure(&self) -> bool {
        matches!(self, TokenError::KeyGeneration(_) | TokenError::Signing(_))
    }
}
