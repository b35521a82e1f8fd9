//! # keyward-token
//!
//! Token handling for Keyward.
//!
//! This crate provides functionality for:
//! - Generating per-principal RSA key pairs (PKCS#1 PEM)
//! - Signing claim sets into RS256 bearer tokens
//! - Decoding a token's claims *without* trust, to locate the claimed principal
//! - Verifying a token against that principal's public key
//! - Deciding whether a stored token can be reused or a new one must be issued
//!
//! ## Two-Stage Verification
//!
//! | Stage | Entry point | Trust | Used for |
//! |-------|-------------|-------|----------|
//! | Unauthenticated decode | [`decode_unchecked`] | none | finding whose key to fetch |
//! | Authenticated verify | [`TokenVerifier::verify`] | signature + expiry | everything else |
//!
//! The two stages return different types: [`UnverifiedClaims`] only exposes the
//! claimed principal id and cannot be turned into [`Claims`].

pub mod claims;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod token;

pub use claims::{Claims, UnverifiedClaims};
pub use error::TokenError;
pub use issuer::{Issued, TokenIssuer};
pub use keys::{KeyGenerator, generate_keypair};
pub use token::{TokenSigner, TokenVerifier, decode_unchecked};

#[cfg(test)]
pub(crate) mod testutil {
    use keyward_core::KeyMaterial;
    use std::sync::LazyLock;

    static KEY_A: LazyLock<KeyMaterial> =
        LazyLock::new(|| crate::generate_keypair().expect("key generation"));
    static KEY_B: LazyLock<KeyMaterial> =
        LazyLock::new(|| crate::generate_keypair().expect("key generation"));

    /// A key pair shared by every test in the crate.
    pub fn key_a() -> &'static KeyMaterial {
        &KEY_A
    }

    /// A second, unrelated key pair.
    pub fn key_b() -> &'static KeyMaterial {
        &KEY_B
    }
}
