//! Registration, login and key rotation.

use crate::error::AuthError;
use crate::password::{hash_password, verify_password};
use keyward_core::{KeyMaterial, KeyPairRecord, NewPrincipal, Principal, PrincipalId};
use keyward_store::{CredentialStore, DirectoryStore, SharedStore, StoreError};
use keyward_token::{Issued, KeyGenerator, TokenError, TokenIssuer};

/// Input for [`AccountService::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
}

/// Principal lifecycle operations that involve key material or tokens.
#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
    issuer: TokenIssuer,
    keys: KeyGenerator,
}

impl AccountService {
    pub fn new(store: SharedStore, issuer: TokenIssuer, keys: KeyGenerator) -> Self {
        Self {
            store,
            issuer,
            keys,
        }
    }

    /// Create a principal together with its first key pair.
    ///
    /// Nothing is persisted if hashing or key generation fails.
    pub async fn register(&self, registration: Registration) -> Result<Principal, AuthError> {
        let Registration {
            name,
            email,
            password,
            roles,
            groups,
        } = registration;

        if name.trim().is_empty() {
            return Err(AuthError::InvalidInput("name must not be empty".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput(format!("'{email}' is not an email")));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }

        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))??;
        let material = self.generate_key().await?;

        let principal = self
            .store
            .create_principal(
                NewPrincipal {
                    name,
                    email,
                    password_hash,
                    roles,
                    groups,
                },
                material,
            )
            .await?;

        tracing::info!(principal_id = principal.id, "registered principal");
        Ok(principal)
    }

    /// Check credentials and return a token for the principal.
    ///
    /// A still-valid stored token is returned as is unless `force_regenerate`
    /// is set. New tokens are persisted with a conditional write; if another
    /// login for the same principal wins, its token is returned instead.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        force_regenerate: bool,
    ) -> Result<Issued, AuthError> {
        let Some(principal) = self.store.find_principal_by_email(email).await? else {
            tracing::debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let candidate = password.to_string();
        let stored_hash = principal.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
                .await
                .map_err(|e| AuthError::Task(e.to_string()))?;
        if !matches {
            tracing::debug!(principal_id = principal.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_for(&principal, force_regenerate).await
    }

    /// Issue (or reuse) a token for an already-authenticated principal.
    pub async fn issue_for(
        &self,
        principal: &Principal,
        force_regenerate: bool,
    ) -> Result<Issued, AuthError> {
        let key = self
            .store
            .find_active_key(principal.id)
            .await?
            .ok_or(TokenError::KeyNotFound)?;

        let issued = self
            .issuer
            .issue_or_reuse(principal, &key, force_regenerate)?;
        if issued.reused {
            return Ok(issued);
        }

        let swapped = self
            .store
            .swap_token(principal.id, principal.token.as_deref(), &issued.token)
            .await?;
        if swapped {
            return Ok(issued);
        }

        self.concurrent_winner(principal.id, &key)
            .await?
            .ok_or_else(|| {
                AuthError::Store(StoreError::Conflict(format!(
                    "token for principal {} changed during login",
                    principal.id
                )))
            })
    }

    /// Re-read the stored token after losing a conditional write and return
    /// it if it verifies against `key`.
    async fn concurrent_winner(
        &self,
        principal_id: PrincipalId,
        key: &KeyPairRecord,
    ) -> Result<Option<Issued>, AuthError> {
        let current = self
            .store
            .find_principal(principal_id)
            .await?
            .ok_or(AuthError::UnknownPrincipal(principal_id))?;

        let Some(stored) = current.current_token() else {
            return Ok(None);
        };
        match self.issuer.verifier().verify(stored, &key.public_key_pem) {
            Ok(claims) => {
                tracing::info!(principal_id, "concurrent login persisted first; reusing its token");
                Ok(Some(Issued {
                    token: stored.to_string(),
                    claims,
                    reused: true,
                }))
            }
            Err(e) => {
                tracing::warn!(principal_id, error = %e, "lost token race to an unverifiable token");
                Ok(None)
            }
        }
    }

    /// Replace the principal's active key pair.
    ///
    /// Tokens signed with the previous key stop verifying immediately.
    pub async fn rotate_key(&self, principal_id: PrincipalId) -> Result<KeyPairRecord, AuthError> {
        if self.store.find_principal(principal_id).await?.is_none() {
            return Err(AuthError::UnknownPrincipal(principal_id));
        }
        let material = self.generate_key().await?;
        Ok(self.store.rotate_key(principal_id, material).await?)
    }

    async fn generate_key(&self) -> Result<KeyMaterial, AuthError> {
        let generator = self.keys.clone();
        let material = tokio::task::spawn_blocking(move || generator.generate())
            .await
            .map_err(|e| AuthError::Task(e.to_string()))??;
        Ok(material)
    }
}
