//! Token claim sets.

use crate::error::TokenError;
use chrono::{DateTime, Duration, Utc};
use keyward_core::{Principal, PrincipalId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims carried by a verified token.
///
/// Serialized as `{user_id, username, email, roles, groups, exp, iat, jti}`
/// with `exp`/`iat` in Unix epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal the token was issued to.
    pub user_id: PrincipalId,

    /// Display name at issuance time.
    pub username: String,

    /// Email at issuance time.
    pub email: String,

    /// Role names at issuance time. Never used for authorization.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Group names at issuance time.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Expiration (seconds since epoch).
    pub exp: i64,

    /// Issued at (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Unique token id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Build the claim set for `principal`, issued at `issued_at` and valid
    /// for `lifetime`.
    pub fn for_principal(
        principal: &Principal,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            user_id: principal.id,
            username: principal.name.clone(),
            email: principal.email.clone(),
            roles: principal.roles.clone(),
            groups: principal.groups.clone(),
            exp: (issued_at + lifetime).timestamp(),
            iat: Some(issued_at.timestamp()),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Expiration as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Check if the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Convert a raw JSON object into typed claims.
    pub(crate) fn from_map(map: Map<String, Value>) -> Result<Self, TokenError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| TokenError::MalformedClaims(e.to_string()))
    }
}

/// Claims read from a token whose signature has *not* been checked.
///
/// The only thing this is good for is finding out which principal's public
/// key to fetch. There is no conversion into [`Claims`].
#[derive(Debug, Clone)]
pub struct UnverifiedClaims {
    raw: Map<String, Value>,
}

impl UnverifiedClaims {
    pub(crate) fn new(raw: Map<String, Value>) -> Self {
        Self { raw }
    }

    /// The principal id the token claims to belong to.
    ///
    /// Accepts an integer or an integral float; anything else is `None`.
    pub fn principal_id(&self) -> Option<PrincipalId> {
        principal_id_of(&self.raw)
    }

    /// The raw, untrusted payload (for display only).
    pub fn untrusted_payload(&self) -> &Map<String, Value> {
        &self.raw
    }
}

/// Read the `user_id` claim as an integer or an integral float.
pub(crate) fn principal_id_of(raw: &Map<String, Value>) -> Option<PrincipalId> {
    match raw.get("user_id")? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Read the `exp` claim as seconds since epoch.
///
/// Integer and float representations are both accepted. Anything else,
/// including a float outside the i64 range, is treated as missing.
pub(crate) fn expiration_of(raw: &Map<String, Value>) -> Option<i64> {
    match raw.get("exp")? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f.trunc() as i64)
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_claims_for_principal() {
        let principal = Principal {
            id: 42,
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
            token: None,
            roles: vec!["user".into()],
            groups: vec!["staff".into()],
        };
        let now = Utc::now();
        let claims = Claims::for_principal(&principal, now, Duration::hours(72));

        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.roles, vec!["user".to_string()]);
        assert_eq!(claims.groups, vec!["staff".to_string()]);
        assert_eq!(claims.iat, Some(now.timestamp()));
        assert_eq!(claims.exp, (now + Duration::hours(72)).timestamp());
        assert!(claims.jti.is_some());
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_principal_id_accepts_integral_float() {
        let unverified = UnverifiedClaims::new(object(json!({ "user_id": 7.0 })));
        assert_eq!(unverified.principal_id(), Some(7));

        let unverified = UnverifiedClaims::new(object(json!({ "user_id": 7 })));
        assert_eq!(unverified.principal_id(), Some(7));
    }

    #[test]
    fn test_principal_id_rejects_other_shapes() {
        for value in [json!("7"), json!(7.5), json!(null), json!([7])] {
            let unverified = UnverifiedClaims::new(object(json!({ "user_id": value })));
            assert_eq!(unverified.principal_id(), None);
        }
        let unverified = UnverifiedClaims::new(Map::new());
        assert_eq!(unverified.principal_id(), None);
    }

    #[test]
    fn test_expiration_of() {
        assert_eq!(expiration_of(&object(json!({ "exp": 100 }))), Some(100));
        assert_eq!(expiration_of(&object(json!({ "exp": 100.9 }))), Some(100));
        assert_eq!(expiration_of(&object(json!({ "exp": "100" }))), None);
        assert_eq!(expiration_of(&object(json!({ "exp": 1e300 }))), None);
        assert_eq!(expiration_of(&object(json!({ "exp": -1e300 }))), None);
        assert_eq!(expiration_of(&Map::new()), None);
    }

    #[test]
    fn test_from_map_reports_malformed_claims() {
        let err = Claims::from_map(object(json!({ "user_id": "nope", "exp": 1 }))).unwrap_err();
        assert!(matches!(err, TokenError::MalformedClaims(_)));
    }
}
