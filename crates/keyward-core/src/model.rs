//! Records the credential engine reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a principal (user) record.
pub type PrincipalId = i64;

/// Identifier of a role record.
pub type RoleId = i64;

/// Identifier of a group record.
pub type GroupId = i64;

/// An authenticated identity.
///
/// Role and group memberships are carried by name; the store resolves them
/// against the role and group tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    /// Unique display name.
    pub name: String,
    /// Unique email, used to log in.
    pub email: String,
    /// Opaque one-way credential (argon2 PHC string).
    pub password_hash: String,
    /// The most recently issued token, kept for reuse-without-reissue.
    pub token: Option<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
}

impl Principal {
    /// Whether the principal currently holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The stored token, treating an empty string as absent.
    pub fn current_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Input for creating a principal.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
}

/// Partial update of a principal. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct PrincipalUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
}

/// Freshly generated RSA key material, not yet bound to a principal.
#[derive(Clone)]
pub struct KeyMaterial {
    /// PKCS#1 private key, PEM framed.
    pub private_key_pem: String,
    /// PKCS#1 public key, PEM framed.
    pub public_key_pem: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key_pem", &"<redacted>")
            .field("public_key_pem", &self.public_key_pem)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A persisted key pair belonging to one principal.
#[derive(Clone)]
pub struct KeyPairRecord {
    pub id: i64,
    pub principal_id: PrincipalId,
    pub private_key_pem: String,
    pub public_key_pem: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// At most one record per principal is active.
    pub active: bool,
}

impl KeyPairRecord {
    /// Bind generated material to a principal as its active key.
    pub fn from_material(id: i64, principal_id: PrincipalId, material: KeyMaterial) -> Self {
        Self {
            id,
            principal_id,
            private_key_pem: material.private_key_pem,
            public_key_pem: material.public_key_pem,
            created_at: material.created_at,
            expires_at: material.expires_at,
            active: true,
        }
    }

    /// Whether the record holds a usable public key.
    pub fn has_public_key(&self) -> bool {
        !self.public_key_pem.trim().is_empty()
    }

    /// Whether the key has passed its expiration horizon.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl std::fmt::Debug for KeyPairRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairRecord")
            .field("id", &self.id)
            .field("principal_id", &self.principal_id)
            .field("private_key_pem", &"<redacted>")
            .field("public_key_pem", &self.public_key_pem)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("active", &self.active)
            .finish()
    }
}

/// A named capability (e.g. "admin").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// A named collection of principals with an optional parent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn principal(token: Option<&str>) -> Principal {
        Principal {
            id: 1,
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "x".into(),
            token: token.map(str::to_string),
            roles: vec!["user".into()],
            groups: vec![],
        }
    }

    #[test]
    fn test_has_role() {
        let p = principal(None);
        assert!(p.has_role("user"));
        assert!(!p.has_role("admin"));
    }

    #[test]
    fn test_empty_token_is_absent() {
        assert_eq!(principal(Some("")).current_token(), None);
        assert_eq!(principal(Some("abc")).current_token(), Some("abc"));
        assert_eq!(principal(None).current_token(), None);
    }

    #[test]
    fn test_key_record_expiry_and_debug_redaction() {
        let now = Utc::now();
        let record = KeyPairRecord::from_material(
            7,
            1,
            KeyMaterial {
                private_key_pem: "SECRET".into(),
                public_key_pem: "  ".into(),
                created_at: now - Duration::days(31),
                expires_at: now - Duration::days(1),
            },
        );

        assert!(record.active);
        assert!(record.is_expired());
        assert!(!record.has_public_key());
        assert!(!format!("{record:?}").contains("SECRET"));
    }
}
