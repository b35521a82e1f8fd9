//! Access decision gate for privileged routes.
//!
//! The gate chains the two verification stages explicitly:
//!
//! 1. [`decode_unchecked`] names the principal the token *claims* to be.
//! 2. That principal's active public key is fetched from the store and
//!    [`TokenVerifier::verify`] authenticates the token against it.
//!
//! Only then is the principal's role set, re-read live from the store,
//! consulted. Every failure before the role check is reported as a generic
//! unauthenticated [`DenyReason`]; the precise cause is logged, not returned.

use keyward_core::Principal;
use keyward_store::{CredentialStore, SharedStore};
use keyward_token::{Claims, TokenVerifier, decode_unchecked};
use std::fmt;

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No `Authorization` header or not a bearer token.
    MissingCredential,
    /// The token doesn't decode or names no principal.
    MalformedClaims,
    /// The claimed principal doesn't exist (or couldn't be loaded).
    UnknownPrincipal,
    /// The principal has no usable public key.
    NoKeyMaterial,
    /// Signature, algorithm, expiry or key-format check failed.
    InvalidToken,
    /// Authenticated, but the required role isn't held.
    InsufficientRole,
}

impl DenyReason {
    /// `true` for authorization failures (403); everything else is an
    /// authentication failure (401).
    pub fn is_forbidden(self) -> bool {
        matches!(self, DenyReason::InsufficientRole)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::MissingCredential => "missing_credential",
            DenyReason::MalformedClaims => "malformed_claims",
            DenyReason::UnknownPrincipal => "unknown_principal",
            DenyReason::NoKeyMaterial => "no_key_material",
            DenyReason::InvalidToken => "invalid_token",
            DenyReason::InsufficientRole => "insufficient_role",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated, authorized caller.
#[derive(Debug, Clone)]
pub struct Authorized {
    /// The principal as currently stored (live roles and groups).
    pub principal: Principal,
    /// The verified claims carried by the token.
    pub claims: Claims,
}

/// Outcome of [`AccessGate::authorize`].
#[derive(Debug, Clone)]
pub enum Decision {
    Allow(Authorized),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// Renders allow/deny decisions for bearer tokens.
#[derive(Clone)]
pub struct AccessGate {
    store: SharedStore,
    verifier: TokenVerifier,
}

impl AccessGate {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            verifier: TokenVerifier::new(),
        }
    }

    /// Decide whether the bearer of `authorization` may proceed.
    ///
    /// With `required_role == None` any authenticated principal is allowed.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        required_role: Option<&str>,
    ) -> Decision {
        let Some(token) = bearer_token(authorization) else {
            return deny(DenyReason::MissingCredential, None);
        };

        let claimed = match decode_unchecked(token) {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::debug!(error = %e, "token does not decode");
                return deny(DenyReason::MalformedClaims, None);
            }
        };
        let Some(principal_id) = claimed.principal_id() else {
            return deny(DenyReason::MalformedClaims, None);
        };

        let principal = match self.store.find_principal(principal_id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => return deny(DenyReason::UnknownPrincipal, Some(principal_id)),
            Err(e) => {
                tracing::error!(principal_id, error = %e, "store lookup failed during authorization");
                return deny(DenyReason::UnknownPrincipal, Some(principal_id));
            }
        };

        let key = match self.store.find_active_key(principal_id).await {
            Ok(Some(key)) if key.has_public_key() => key,
            Ok(_) => return deny(DenyReason::NoKeyMaterial, Some(principal_id)),
            Err(e) => {
                tracing::error!(principal_id, error = %e, "key lookup failed during authorization");
                return deny(DenyReason::UnknownPrincipal, Some(principal_id));
            }
        };

        let claims = match self.verifier.verify(token, &key.public_key_pem) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(principal_id, error = %e, "token verification failed");
                return deny(DenyReason::InvalidToken, Some(principal_id));
            }
        };

        if let Some(role) = required_role {
            if !principal.has_role(role) {
                tracing::warn!(principal_id, role, "principal lacks required role");
                return Decision::Deny(DenyReason::InsufficientRole);
            }
        }

        Decision::Allow(Authorized { principal, claims })
    }
}

fn deny(reason: DenyReason, principal_id: Option<i64>) -> Decision {
    tracing::debug!(?principal_id, reason = %reason, "request denied");
    Decision::Deny(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(Some("Bearer   abc ")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(Some("bearer abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn test_only_insufficient_role_is_forbidden() {
        for reason in [
            DenyReason::MissingCredential,
            DenyReason::MalformedClaims,
            DenyReason::UnknownPrincipal,
            DenyReason::NoKeyMaterial,
            DenyReason::InvalidToken,
        ] {
            assert!(!reason.is_forbidden(), "{reason}");
        }
        assert!(DenyReason::InsufficientRole.is_forbidden());
    }
}
