//! # keyward-store
//!
//! Persistence for principals, key pairs, roles and groups.
//!
//! Two traits split the surface:
//!
//! - [`CredentialStore`] is what the credential engine consumes: principal
//!   lookup, active key lookup and the conditional token write.
//! - [`DirectoryStore`] is the CRUD plumbing behind the HTTP API.
//!
//! Both are implemented by [`MemoryStore`] (tests, ephemeral deployments) and
//! [`SqliteStore`]. Services hold a [`SharedStore`] injected at construction.

use async_trait::async_trait;
use keyward_core::{
    Group, GroupId, KeyMaterial, KeyPairRecord, NewPrincipal, Principal, PrincipalId,
    PrincipalUpdate, Role, RoleId,
};
use std::sync::Arc;

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Lookups and writes the credential engine depends on.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a principal with its role and group names.
    async fn find_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    /// Fetch a principal by email.
    async fn find_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;

    /// Fetch the principal's active key pair.
    async fn find_active_key(&self, principal_id: PrincipalId)
    -> StoreResult<Option<KeyPairRecord>>;

    /// Replace the principal's stored token with `new_token`, but only if the
    /// stored token still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the principal doesn't exist.
    async fn swap_token(
        &self,
        principal_id: PrincipalId,
        expected: Option<&str>,
        new_token: &str,
    ) -> StoreResult<bool>;
}

/// Record management for principals, keys, roles and groups.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Create a principal together with its first (active) key pair.
    ///
    /// Either both records are written or neither is.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if the name or email is taken
    /// - [`StoreError::NotFound`] if a role or group name doesn't resolve
    async fn create_principal(
        &self,
        principal: NewPrincipal,
        key: KeyMaterial,
    ) -> StoreResult<Principal>;

    /// Apply a partial update. Role and group lists replace the current sets.
    async fn update_principal(
        &self,
        id: PrincipalId,
        update: PrincipalUpdate,
    ) -> StoreResult<Principal>;

    /// Delete a principal, its key pairs and memberships.
    async fn delete_principal(&self, id: PrincipalId) -> StoreResult<()>;

    /// List all principals ordered by id.
    async fn list_principals(&self) -> StoreResult<Vec<Principal>>;

    /// Insert `key` as the principal's active key pair and deactivate the
    /// previous one.
    async fn rotate_key(
        &self,
        principal_id: PrincipalId,
        key: KeyMaterial,
    ) -> StoreResult<KeyPairRecord>;

    async fn create_role(&self, name: &str) -> StoreResult<Role>;
    async fn find_role(&self, id: RoleId) -> StoreResult<Option<Role>>;
    async fn rename_role(&self, id: RoleId, name: &str) -> StoreResult<Role>;
    async fn delete_role(&self, id: RoleId) -> StoreResult<()>;
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    /// Return the role named `name`, creating it if needed.
    async fn ensure_role(&self, name: &str) -> StoreResult<Role>;

    async fn create_group(&self, name: &str, parent_id: Option<GroupId>) -> StoreResult<Group>;
    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>>;
    async fn update_group(
        &self,
        id: GroupId,
        name: &str,
        parent_id: Option<GroupId>,
    ) -> StoreResult<Group>;
    async fn delete_group(&self, id: GroupId) -> StoreResult<()>;
    async fn list_groups(&self) -> StoreResult<Vec<Group>>;

    /// Return the group named `name`, creating it (without parent) if needed.
    async fn ensure_group(&self, name: &str) -> StoreResult<Group>;
}

/// A store offering both surfaces.
pub trait Store: CredentialStore + DirectoryStore {}

impl<T: CredentialStore + DirectoryStore> Store for T {}

/// The store handle passed to services.
pub type SharedStore = Arc<dyn Store>;

/// Reject a group that would become its own parent.
pub(crate) fn check_parent(id: GroupId, parent_id: Option<GroupId>) -> StoreResult<()> {
    if parent_id == Some(id) {
        return Err(StoreError::Invalid(format!(
            "group {id} cannot be its own parent"
        )));
    }
    Ok(())
}
