//! Token commands.
//!
//! `keyward token mint` - Sign a token with a private key.
//! `keyward token inspect` - Decode a token without verification.
//! `keyward token verify` - Verify a token against a public key.

use super::{inline_or_file, resolve_pem};
use anyhow::Context;
use chrono::Utc;
use keyward_core::Principal;
use keyward_token::{Claims, TokenSigner, TokenVerifier, decode_unchecked};
use std::fs;
use std::path::PathBuf;

/// Claim content for `token mint`.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub expires: String,
}

fn parse_lifetime(raw: &str) -> anyhow::Result<chrono::Duration> {
    let parsed = humantime::parse_duration(raw.trim())
        .with_context(|| format!("Invalid duration '{raw}' (expected e.g. \"72h\")"))?;
    Ok(chrono::Duration::from_std(parsed)?)
}

/// Sign the claims described by `request`.
pub fn mint_token(private_key: &str, request: MintRequest) -> anyhow::Result<(String, Claims)> {
    let pem = resolve_pem(private_key, "Private key")?;
    let lifetime = parse_lifetime(&request.expires)?;

    let subject = Principal {
        id: request.user_id,
        name: request.username,
        email: request.email,
        password_hash: String::new(),
        token: None,
        roles: request.roles,
        groups: request.groups,
    };
    let claims = Claims::for_principal(&subject, Utc::now(), lifetime);
    let token = TokenSigner::new()
        .sign(&claims, &pem)
        .context("Failed to sign token")?;
    Ok((token, claims))
}

pub fn mint(
    private_key: &str,
    request: MintRequest,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (token, claims) = mint_token(private_key, request)?;

    if let Some(output_path) = output {
        fs::write(&output_path, &token)?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  User:    {} ({})", claims.username, claims.user_id);
        if let Some(expires_at) = claims.expires_at() {
            println!("  Expires: {}", expires_at.to_rfc3339());
        }
    } else {
        println!("{token}");
    }
    Ok(())
}

/// Pretty-printed payload of an unverified token.
pub fn inspect_payload(token: &str) -> anyhow::Result<String> {
    let token = inline_or_file(token)?;
    let unverified = decode_unchecked(&token)?;
    Ok(serde_json::to_string_pretty(unverified.untrusted_payload())?)
}

pub fn inspect(token: &str) -> anyhow::Result<()> {
    let payload = inspect_payload(token)?;
    println!("⚠️  Signature NOT verified. Do not trust these claims.");
    println!();
    println!("{payload}");
    Ok(())
}

/// Verify `token` and return its claims.
pub fn verify_token(token: &str, public_key: &str) -> anyhow::Result<Claims> {
    let token = inline_or_file(token)?;
    let pem = resolve_pem(public_key, "Public key")?;
    TokenVerifier::new()
        .verify(&token, &pem)
        .context("Token verification failed")
}

pub fn verify(token: &str, public_key: &str) -> anyhow::Result<()> {
    let claims = verify_token(token, public_key)?;
    println!("✔ Token is valid");
    println!();
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::keys::{PRIVATE_KEY_FILE, PUBLIC_KEY_FILE, generate};
    use tempfile::tempdir;

    fn request(expires: &str) -> MintRequest {
        MintRequest {
            user_id: 42,
            username: "alice".into(),
            email: "alice@example.com".into(),
            roles: vec!["admin".into()],
            groups: vec![],
            expires: expires.into(),
        }
    }

    #[test]
    fn test_parse_lifetime() {
        assert_eq!(parse_lifetime("72h").unwrap(), chrono::Duration::hours(72));
        assert_eq!(parse_lifetime("30m").unwrap(), chrono::Duration::minutes(30));
        assert!(parse_lifetime("soon").is_err());
    }

    #[test]
    fn test_mint_inspect_verify_with_key_files() {
        let dir = tempdir().unwrap();
        generate(Some(dir.path().to_path_buf()), 2048).unwrap();
        let private_path = dir.path().join(PRIVATE_KEY_FILE);
        let public_path = dir.path().join(PUBLIC_KEY_FILE);
        let token_path = dir.path().join("token.jwt");

        mint(
            private_path.to_str().unwrap(),
            request("1h"),
            Some(token_path.clone()),
        )
        .unwrap();

        let payload = inspect_payload(token_path.to_str().unwrap()).unwrap();
        assert!(payload.contains("\"username\": \"alice\""));

        let claims = verify_token(
            token_path.to_str().unwrap(),
            public_path.to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn test_verify_with_inline_pem_and_wrong_key() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        generate(Some(a.clone()), 2048).unwrap();
        generate(Some(b.clone()), 2048).unwrap();

        let private_pem = fs::read_to_string(a.join(PRIVATE_KEY_FILE)).unwrap();
        let (token, _) = mint_token(&private_pem, request("1h")).unwrap();

        let public_a = fs::read_to_string(a.join(PUBLIC_KEY_FILE)).unwrap();
        assert!(verify_token(&token, &public_a).is_ok());
        assert!(verify_token(&token, b.join(PUBLIC_KEY_FILE).to_str().unwrap()).is_err());
    }

    #[test]
    fn test_key_argument_must_be_pem_or_file() {
        let err = mint_token("/no/such/key.pem", request("1h")).unwrap_err();
        assert!(err.to_string().contains("neither a readable file nor a PEM block"));
    }
}
