//! End-to-end login and authorization flows over an in-memory store.

use chrono::Duration;
use keyward_auth::{AccessGate, AccountService, AuthError, Decision, DenyReason, Registration};
use keyward_core::PrincipalUpdate;
use keyward_store::{CredentialStore, DirectoryStore, MemoryStore, SharedStore, StoreError};
use keyward_token::{KeyGenerator, TokenIssuer, TokenSigner};
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

struct Harness {
    store: SharedStore,
    accounts: AccountService,
    gate: AccessGate,
}

async fn harness() -> Harness {
    let store: SharedStore = Arc::new(MemoryStore::new());
    for role in ["admin", "user"] {
        store.ensure_role(role).await.unwrap();
        store.ensure_group(role).await.unwrap();
    }
    let accounts = AccountService::new(
        store.clone(),
        TokenIssuer::default(),
        KeyGenerator::default(),
    );
    let gate = AccessGate::new(store.clone());
    Harness {
        store,
        accounts,
        gate,
    }
}

fn registration(name: &str, roles: &[&str]) -> Registration {
    Registration {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        password: format!("{name}-password"),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        groups: vec!["user".to_string()],
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn deny_reason(decision: Decision) -> DenyReason {
    match decision {
        Decision::Deny(reason) => reason,
        Decision::Allow(a) => panic!("expected deny, got allow for {}", a.principal.name),
    }
}

// =============================================================================
// LIVE ROLE CHECK
// =============================================================================

#[tokio::test]
async fn role_grant_takes_effect_without_reissuing() {
    let h = harness().await;
    let alice = h.accounts.register(registration("alice", &["user"])).await.unwrap();

    let t1 = h
        .accounts
        .login("alice@example.com", "alice-password", false)
        .await
        .unwrap();
    assert!(!t1.reused);
    let header = bearer(&t1.token);

    let before = h.gate.authorize(Some(&header), Some("admin")).await;
    assert_eq!(deny_reason(before), DenyReason::InsufficientRole);

    h.store
        .update_principal(
            alice.id,
            PrincipalUpdate {
                roles: Some(vec!["user".into(), "admin".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    match h.gate.authorize(Some(&header), Some("admin")).await {
        Decision::Allow(authorized) => {
            assert_eq!(authorized.principal.id, alice.id);
            // The embedded claim is stale; the store is authoritative.
            assert_eq!(authorized.claims.roles, vec!["user".to_string()]);
        }
        Decision::Deny(reason) => panic!("expected allow, got {reason}"),
    }
}

#[tokio::test]
async fn role_revocation_takes_effect_without_reissuing() {
    let h = harness().await;
    let root = h.accounts.register(registration("root", &["admin"])).await.unwrap();
    let issued = h
        .accounts
        .login("root@example.com", "root-password", false)
        .await
        .unwrap();
    let header = bearer(&issued.token);
    assert!(h.gate.authorize(Some(&header), Some("admin")).await.is_allowed());

    h.store
        .update_principal(
            root.id,
            PrincipalUpdate {
                roles: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let decision = h.gate.authorize(Some(&header), Some("admin")).await;
    assert_eq!(deny_reason(decision), DenyReason::InsufficientRole);
    // Still authenticated for routes without a role requirement.
    assert!(h.gate.authorize(Some(&header), None).await.is_allowed());
}

// =============================================================================
// LOGIN
// =============================================================================

#[tokio::test]
async fn login_reuses_until_forced() {
    let h = harness().await;
    let bob = h.accounts.register(registration("bob", &["user"])).await.unwrap();

    let first = h.accounts.login("bob@example.com", "bob-password", false).await.unwrap();
    let again = h.accounts.login("bob@example.com", "bob-password", false).await.unwrap();
    assert!(again.reused);
    assert_eq!(again.token, first.token);

    let forced = h.accounts.login("bob@example.com", "bob-password", true).await.unwrap();
    assert!(!forced.reused);
    assert_ne!(forced.token, first.token);

    let stored = h.store.find_principal(bob.id).await.unwrap().unwrap();
    assert_eq!(stored.token.as_deref(), Some(forced.token.as_str()));
    // The superseded token still verifies until it expires.
    assert!(h.gate.authorize(Some(&bearer(&first.token)), None).await.is_allowed());
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let h = harness().await;
    h.accounts.register(registration("carol", &[])).await.unwrap();

    let wrong_password = h
        .accounts
        .login("carol@example.com", "nope", false)
        .await
        .unwrap_err();
    let unknown_email = h
        .accounts
        .login("nobody@example.com", "carol-password", false)
        .await
        .unwrap_err();
    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn registration_validates_input_and_roles() {
    let h = harness().await;

    let mut bad = registration("dave", &[]);
    bad.email = "not-an-email".into();
    let err = h.accounts.register(bad).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidInput(_)));

    let err = h
        .accounts
        .register(registration("dave", &["superuser"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::NotFound { .. })));
    assert!(h.store.list_principals().await.unwrap().is_empty());
}

#[tokio::test]
async fn lost_token_race_returns_the_winner() {
    let h = harness().await;
    let erin = h.accounts.register(registration("erin", &[])).await.unwrap();
    let winner = h.accounts.login("erin@example.com", "erin-password", false).await.unwrap();

    // `erin` is the snapshot taken before the winning login persisted.
    let late = h.accounts.issue_for(&erin, false).await.unwrap();
    assert_eq!(late.token, winner.token);
    assert!(late.reused);
}

#[tokio::test]
async fn lost_token_race_to_garbage_is_a_conflict() {
    let h = harness().await;
    let frank = h.accounts.register(registration("frank", &[])).await.unwrap();
    assert!(h.store.swap_token(frank.id, None, "not-a-token").await.unwrap());

    let err = h.accounts.issue_for(&frank, false).await.unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::Conflict(_))), "{err:?}");
}

// =============================================================================
// KEY ROTATION
// =============================================================================

#[tokio::test]
async fn rotation_revokes_tokens_signed_by_the_old_key() {
    let h = harness().await;
    let gina = h.accounts.register(registration("gina", &["admin"])).await.unwrap();
    let old = h.accounts.login("gina@example.com", "gina-password", false).await.unwrap();

    let rotated = h.accounts.rotate_key(gina.id).await.unwrap();
    assert!(rotated.active);

    let decision = h.gate.authorize(Some(&bearer(&old.token)), Some("admin")).await;
    assert_eq!(deny_reason(decision), DenyReason::InvalidToken);

    let fresh = h.accounts.login("gina@example.com", "gina-password", false).await.unwrap();
    assert!(!fresh.reused);
    assert_ne!(fresh.token, old.token);
    assert!(h.gate.authorize(Some(&bearer(&fresh.token)), Some("admin")).await.is_allowed());

    let err = h.accounts.rotate_key(gina.id + 1000).await.unwrap_err();
    assert!(matches!(err, AuthError::UnknownPrincipal(_)));
}

// =============================================================================
// GATE DENIALS
// =============================================================================

#[tokio::test]
async fn gate_denies_each_failure_category() {
    let h = harness().await;
    let hank = h.accounts.register(registration("hank", &["user"])).await.unwrap();
    let issued = h.accounts.login("hank@example.com", "hank-password", false).await.unwrap();
    let key = h.store.find_active_key(hank.id).await.unwrap().unwrap();

    assert_eq!(
        deny_reason(h.gate.authorize(None, None).await),
        DenyReason::MissingCredential
    );
    assert_eq!(
        deny_reason(h.gate.authorize(Some(&issued.token), None).await),
        DenyReason::MissingCredential
    );
    assert_eq!(
        deny_reason(h.gate.authorize(Some("Bearer garbage"), None).await),
        DenyReason::MalformedClaims
    );

    // Signed with hank's key but naming a principal that doesn't exist.
    let mut ghost = issued.claims.clone();
    ghost.user_id = hank.id + 1000;
    let ghost_token = TokenSigner::new().sign(&ghost, &key.private_key_pem).unwrap();
    assert_eq!(
        deny_reason(h.gate.authorize(Some(&bearer(&ghost_token)), None).await),
        DenyReason::UnknownPrincipal
    );

    // Valid signature, expired.
    let mut expired = issued.claims.clone();
    expired.exp = (chrono::Utc::now() - Duration::minutes(1)).timestamp();
    let expired_token = TokenSigner::new().sign(&expired, &key.private_key_pem).unwrap();
    assert_eq!(
        deny_reason(h.gate.authorize(Some(&bearer(&expired_token)), None).await),
        DenyReason::InvalidToken
    );

    // Claims lifted onto another principal's key.
    let ivy = h.accounts.register(registration("ivy", &["admin"])).await.unwrap();
    let mut spoofed = issued.claims.clone();
    spoofed.user_id = ivy.id;
    let spoofed_token = TokenSigner::new().sign(&spoofed, &key.private_key_pem).unwrap();
    assert_eq!(
        deny_reason(h.gate.authorize(Some(&bearer(&spoofed_token)), Some("admin")).await),
        DenyReason::InvalidToken
    );

    h.store.delete_principal(hank.id).await.unwrap();
    assert_eq!(
        deny_reason(h.gate.authorize(Some(&bearer(&issued.token)), None).await),
        DenyReason::UnknownPrincipal
    );
}
