//! Token signing, unauthenticated decoding and authenticated verification.

use crate::claims::{Claims, UnverifiedClaims, expiration_of, principal_id_of};
use crate::error::TokenError;
use crate::keys::{decoding_key_from_pem, parse_private_key_pem};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Algorithms a presented token may declare.
const RSA_FAMILY: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

const RSA_FAMILY_NAMES: [&str; 6] = ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"];

/// Signs claim sets with a principal's private key.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    algorithm: Algorithm,
}

impl Default for TokenSigner {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RS256,
        }
    }
}

impl TokenSigner {
    /// Create a signer producing RS256 tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `claims` with a PEM-encoded RSA private key.
    pub fn sign(&self, claims: &Claims, private_key_pem: &str) -> Result<String, TokenError> {
        let key = parse_private_key_pem(private_key_pem)?;
        encode(&Header::new(self.algorithm), claims, &key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

/// Verifies tokens against a principal's public key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    validation: Validation,
}

impl Default for TokenVerifier {
    fn default() -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = RSA_FAMILY.to_vec();
        // Expiration is enforced by `verify` itself, after the signature check.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;
        Self { validation }
    }
}

impl TokenVerifier {
    /// Create a verifier accepting the RSA algorithm family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify `token` against `public_key_pem` and return its claims.
    ///
    /// Checks, in order: key presence, key format, declared algorithm,
    /// signature, expiration, claim shape.
    pub fn verify(&self, token: &str, public_key_pem: &str) -> Result<Claims, TokenError> {
        if public_key_pem.trim().is_empty() {
            return Err(TokenError::KeyNotFound);
        }
        let key = decoding_key_from_pem(public_key_pem)?;

        let alg = header_algorithm(token)?;
        if !RSA_FAMILY_NAMES.contains(&alg.as_str()) {
            return Err(TokenError::UnsupportedAlgorithm(alg));
        }

        let data = decode::<Map<String, Value>>(token, &key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::InvalidAlgorithm => TokenError::UnsupportedAlgorithm(alg.clone()),
                ErrorKind::InvalidRsaKey(msg) => TokenError::KeyFormat(msg.to_string()),
                _ => TokenError::MalformedClaims(e.to_string()),
            })?;

        let mut raw = data.claims;
        let exp = expiration_of(&raw).ok_or(TokenError::TokenExpired)?;
        if Utc::now().timestamp() >= exp {
            return Err(TokenError::TokenExpired);
        }
        raw.insert("exp".to_string(), Value::from(exp));
        if let Some(user_id) = principal_id_of(&raw) {
            raw.insert("user_id".to_string(), Value::from(user_id));
        }

        Claims::from_map(raw)
    }
}

/// Decode a token's claims without checking its signature.
///
/// The result identifies which principal the token *claims* to belong to and
/// nothing more; it is not evidence of authenticity.
pub fn decode_unchecked(token: &str) -> Result<UnverifiedClaims, TokenError> {
    let payload = segment(token, 1)?;
    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(raw)) => Ok(UnverifiedClaims::new(raw)),
        Ok(_) => Err(TokenError::MalformedClaims(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(TokenError::MalformedClaims(format!(
            "failed to parse payload: {e}"
        ))),
    }
}

/// Read the `alg` a token declares, whatever it is.
fn header_algorithm(token: &str) -> Result<String, TokenError> {
    let header = segment(token, 0)?;
    let header: Value = serde_json::from_slice(&header)
        .map_err(|e| TokenError::MalformedClaims(format!("failed to parse header: {e}")))?;
    match header.get("alg") {
        Some(Value::String(alg)) => Ok(alg.clone()),
        _ => Err(TokenError::UnsupportedAlgorithm("missing".to_string())),
    }
}

/// Base64url-decode the `index`th dot-separated segment of a compact token.
fn segment(token: &str, index: usize) -> Result<Vec<u8>, TokenError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::MalformedClaims(
            "token must have 3 parts separated by dots".to_string(),
        ));
    }
    URL_SAFE_NO_PAD
        .decode(parts[index])
        .map_err(|e| TokenError::MalformedClaims(format!("failed to decode segment: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{key_a, key_b};
    use chrono::Duration;
    use serde_json::json;

    fn claims(expires_in: Duration) -> Claims {
        Claims {
            user_id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            roles: vec!["user".into()],
            groups: vec!["user".into()],
            exp: (Utc::now() + expires_in).timestamp(),
            iat: Some(Utc::now().timestamp()),
            jti: Some("jti-1".into()),
        }
    }

    fn sign_raw(header: Value, payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let input = claims(Duration::hours(72));
        let token = TokenSigner::new()
            .sign(&input, &key_a().private_key_pem)
            .unwrap();

        let verified = TokenVerifier::new()
            .verify(&token, &key_a().public_key_pem)
            .unwrap();
        assert_eq!(verified, input);
    }

    #[test]
    fn test_verify_with_other_key_fails_signature() {
        let token = TokenSigner::new()
            .sign(&claims(Duration::hours(1)), &key_a().private_key_pem)
            .unwrap();

        let err = TokenVerifier::new()
            .verify(&token, &key_b().public_key_pem)
            .unwrap_err();
        assert!(matches!(err, TokenError::SignatureInvalid));
    }

    #[test]
    fn test_expired_token_with_valid_signature() {
        let token = TokenSigner::new()
            .sign(&claims(-Duration::minutes(5)), &key_a().private_key_pem)
            .unwrap();

        let err = TokenVerifier::new()
            .verify(&token, &key_a().public_key_pem)
            .unwrap_err();
        assert!(matches!(err, TokenError::TokenExpired));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        #[derive(serde::Serialize)]
        struct NoExp {
            user_id: i64,
        }
        let key = parse_private_key_pem(&key_a().private_key_pem).unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &NoExp { user_id: 1 }, &key).unwrap();

        let err = TokenVerifier::new()
            .verify(&token, &key_a().public_key_pem)
            .unwrap_err();
        assert!(matches!(err, TokenError::TokenExpired));
    }

    #[test]
    fn test_float_exp_is_accepted() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp() as f64;
        let payload = json!({
            "user_id": 3.0,
            "username": "bob",
            "email": "bob@example.com",
            "roles": [],
            "groups": [],
            "exp": exp,
        });
        let key = parse_private_key_pem(&key_a().private_key_pem).unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &payload, &key).unwrap();

        let verified = TokenVerifier::new()
            .verify(&token, &key_a().public_key_pem)
            .unwrap();
        assert_eq!(verified.exp, exp as i64);
        assert_eq!(verified.user_id, 3);
    }

    #[test]
    fn test_out_of_range_float_exp_is_expired() {
        let payload = json!({
            "user_id": 1,
            "username": "a",
            "email": "e",
            "exp": 1e300,
        });
        let key = parse_private_key_pem(&key_a().private_key_pem).unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &payload, &key).unwrap();

        let err = TokenVerifier::new()
            .verify(&token, &key_a().public_key_pem)
            .unwrap_err();
        assert!(matches!(err, TokenError::TokenExpired), "{err:?}");
    }

    #[test]
    fn test_pss_signed_token_is_accepted() {
        let input = claims(Duration::hours(1));
        let key = parse_private_key_pem(&key_a().private_key_pem).unwrap();
        let token = encode(&Header::new(Algorithm::PS256), &input, &key).unwrap();

        let verified = TokenVerifier::new()
            .verify(&token, &key_a().public_key_pem)
            .unwrap();
        assert_eq!(verified, input);
    }

    #[test]
    fn test_non_rsa_algorithms_are_rejected() {
        for alg in ["HS256", "none", "ES256", "EdDSA"] {
            let token = sign_raw(
                json!({ "alg": alg, "typ": "JWT" }),
                json!({ "user_id": 1, "exp": 4_000_000_000i64 }),
            );
            let err = TokenVerifier::new()
                .verify(&token, &key_a().public_key_pem)
                .unwrap_err();
            assert!(
                matches!(err, TokenError::UnsupportedAlgorithm(ref a) if a == alg),
                "{alg}: {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_key_fails_before_any_parsing() {
        let err = TokenVerifier::new().verify("garbage", "").unwrap_err();
        assert!(matches!(err, TokenError::KeyNotFound));
    }

    #[test]
    fn test_certificate_pem_is_key_format_error() {
        let token = TokenSigner::new()
            .sign(&claims(Duration::hours(1)), &key_a().private_key_pem)
            .unwrap();
        let cert = key_a()
            .public_key_pem
            .replace("RSA PUBLIC KEY", "CERTIFICATE");

        let err = TokenVerifier::new().verify(&token, &cert).unwrap_err();
        assert!(matches!(err, TokenError::KeyFormat(_)));
    }

    #[test]
    fn test_decode_unchecked_ignores_signature() {
        let token = TokenSigner::new()
            .sign(&claims(Duration::hours(1)), &key_a().private_key_pem)
            .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "AAAA";
        let tampered = parts.join(".");

        let unverified = decode_unchecked(&tampered).unwrap();
        assert_eq!(unverified.principal_id(), Some(1));
    }

    #[test]
    fn test_decode_unchecked_rejects_malformed_tokens() {
        for token in ["", "a.b", "a.b.c.d", "e30.!!!.sig"] {
            assert!(
                matches!(decode_unchecked(token), Err(TokenError::MalformedClaims(_))),
                "{token}"
            );
        }
        let array_payload = sign_raw(json!({ "alg": "RS256" }), json!([1, 2]));
        assert!(matches!(
            decode_unchecked(&array_payload),
            Err(TokenError::MalformedClaims(_))
        ));
    }

    #[test]
    fn test_signing_with_bad_private_key() {
        let err = TokenSigner::new()
            .sign(&claims(Duration::hours(1)), &key_a().public_key_pem)
            .unwrap_err();
        assert!(matches!(err, TokenError::Signing(_)));
    }
}
