//! In-memory store.
//!
//! Backs tests and single-process deployments that don't need durability.
//! All state sits behind one [`tokio::sync::RwLock`], so every operation is
//! atomic with respect to the others, including [`CredentialStore::swap_token`].

use crate::error::{StoreError, StoreResult};
use crate::{CredentialStore, DirectoryStore, check_parent};
use async_trait::async_trait;
use keyward_core::{
    Group, GroupId, KeyMaterial, KeyPairRecord, NewPrincipal, Principal, PrincipalId,
    PrincipalUpdate, Role, RoleId,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    principals: BTreeMap<PrincipalId, Principal>,
    keys: Vec<KeyPairRecord>,
    roles: BTreeMap<RoleId, Role>,
    groups: BTreeMap<GroupId, Group>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_role_names(&self, names: &[String]) -> StoreResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if !self.roles.values().any(|r| &r.name == name) {
                return Err(StoreError::not_found("role", name));
            }
            if !resolved.contains(name) {
                resolved.push(name.clone());
            }
        }
        resolved.sort();
        Ok(resolved)
    }

    fn check_group_names(&self, names: &[String]) -> StoreResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if !self.groups.values().any(|g| &g.name == name) {
                return Err(StoreError::not_found("group", name));
            }
            if !resolved.contains(name) {
                resolved.push(name.clone());
            }
        }
        resolved.sort();
        Ok(resolved)
    }

    fn check_principal_unique(
        &self,
        id: Option<PrincipalId>,
        name: &str,
        email: &str,
    ) -> StoreResult<()> {
        for p in self.principals.values() {
            if Some(p.id) == id {
                continue;
            }
            if p.name == name {
                return Err(StoreError::Conflict(format!("user name '{name}' is taken")));
            }
            if p.email == email {
                return Err(StoreError::Conflict(format!("email '{email}' is taken")));
            }
        }
        Ok(())
    }

    fn check_group_ancestry(&self, id: GroupId, parent_id: Option<GroupId>) -> StoreResult<()> {
        check_parent(id, parent_id)?;
        let mut cursor = parent_id;
        while let Some(current) = cursor {
            let group = self
                .groups
                .get(&current)
                .ok_or_else(|| StoreError::not_found("group", current))?;
            if group.parent_id == Some(id) {
                return Err(StoreError::Invalid(format!(
                    "group {id} would become its own ancestor"
                )));
            }
            cursor = group.parent_id;
        }
        Ok(())
    }
}

/// A [`CredentialStore`] and [`DirectoryStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        Ok(self.inner.read().await.principals.get(&id).cloned())
    }

    async fn find_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let inner = self.inner.read().await;
        Ok(inner.principals.values().find(|p| p.email == email).cloned())
    }

    async fn find_active_key(
        &self,
        principal_id: PrincipalId,
    ) -> StoreResult<Option<KeyPairRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .keys
            .iter()
            .find(|k| k.principal_id == principal_id && k.active)
            .cloned())
    }

    async fn swap_token(
        &self,
        principal_id: PrincipalId,
        expected: Option<&str>,
        new_token: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let principal = inner
            .principals
            .get_mut(&principal_id)
            .ok_or_else(|| StoreError::not_found("user", principal_id))?;

        if principal.token.as_deref() != expected {
            return Ok(false);
        }
        principal.token = Some(new_token.to_string());
        Ok(true)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn create_principal(
        &self,
        new: NewPrincipal,
        key: KeyMaterial,
    ) -> StoreResult<Principal> {
        let mut inner = self.inner.write().await;
        inner.check_principal_unique(None, &new.name, &new.email)?;
        let roles = inner.check_role_names(&new.roles)?;
        let groups = inner.check_group_names(&new.groups)?;

        let id = inner.next_id();
        let principal = Principal {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            token: None,
            roles,
            groups,
        };
        let key_id = inner.next_id();
        inner
            .keys
            .push(KeyPairRecord::from_material(key_id, id, key));
        inner.principals.insert(id, principal.clone());

        Ok(principal)
    }

    async fn update_principal(
        &self,
        id: PrincipalId,
        update: PrincipalUpdate,
    ) -> StoreResult<Principal> {
        let mut inner = self.inner.write().await;
        let current = inner
            .principals
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))?;

        let name = update.name.unwrap_or(current.name);
        let email = update.email.unwrap_or(current.email);
        inner.check_principal_unique(Some(id), &name, &email)?;
        let roles = match update.roles {
            Some(roles) => inner.check_role_names(&roles)?,
            None => current.roles,
        };
        let groups = match update.groups {
            Some(groups) => inner.check_group_names(&groups)?,
            None => current.groups,
        };

        let updated = Principal {
            name,
            email,
            roles,
            groups,
            ..current
        };
        inner.principals.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_principal(&self, id: PrincipalId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.principals.remove(&id).is_none() {
            return Err(StoreError::not_found("user", id));
        }
        inner.keys.retain(|k| k.principal_id != id);
        Ok(())
    }

    async fn list_principals(&self) -> StoreResult<Vec<Principal>> {
        Ok(self.inner.read().await.principals.values().cloned().collect())
    }

    async fn rotate_key(
        &self,
        principal_id: PrincipalId,
        key: KeyMaterial,
    ) -> StoreResult<KeyPairRecord> {
        let mut inner = self.inner.write().await;
        if !inner.principals.contains_key(&principal_id) {
            return Err(StoreError::not_found("user", principal_id));
        }
        for existing in inner
            .keys
            .iter_mut()
            .filter(|k| k.principal_id == principal_id)
        {
            existing.active = false;
        }
        let key_id = inner.next_id();
        let record = KeyPairRecord::from_material(key_id, principal_id, key);
        inner.keys.push(record.clone());
        Ok(record)
    }

    async fn create_role(&self, name: &str) -> StoreResult<Role> {
        let mut inner = self.inner.write().await;
        if inner.roles.values().any(|r| r.name == name) {
            return Err(StoreError::Conflict(format!("role '{name}' exists")));
        }
        let role = Role {
            id: inner.next_id(),
            name: name.to_string(),
        };
        inner.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn find_role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.inner.read().await.roles.get(&id).cloned())
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> StoreResult<Role> {
        let mut inner = self.inner.write().await;
        if inner.roles.values().any(|r| r.name == name && r.id != id) {
            return Err(StoreError::Conflict(format!("role '{name}' exists")));
        }
        let old = inner
            .roles
            .get(&id)
            .map(|r| r.name.clone())
            .ok_or_else(|| StoreError::not_found("role", id))?;

        for principal in inner.principals.values_mut() {
            for role in principal.roles.iter_mut().filter(|r| **r == old) {
                *role = name.to_string();
            }
            principal.roles.sort();
        }
        let role = Role {
            id,
            name: name.to_string(),
        };
        inner.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let role = inner
            .roles
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("role", id))?;
        for principal in inner.principals.values_mut() {
            principal.roles.retain(|r| *r != role.name);
        }
        Ok(())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.inner.read().await.roles.values().cloned().collect())
    }

    async fn ensure_role(&self, name: &str) -> StoreResult<Role> {
        let mut inner = self.inner.write().await;
        if let Some(role) = inner.roles.values().find(|r| r.name == name) {
            return Ok(role.clone());
        }
        let role = Role {
            id: inner.next_id(),
            name: name.to_string(),
        };
        inner.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn create_group(&self, name: &str, parent_id: Option<GroupId>) -> StoreResult<Group> {
        let mut inner = self.inner.write().await;
        if inner.groups.values().any(|g| g.name == name) {
            return Err(StoreError::Conflict(format!("group '{name}' exists")));
        }
        if let Some(parent) = parent_id {
            if !inner.groups.contains_key(&parent) {
                return Err(StoreError::not_found("group", parent));
            }
        }
        let group = Group {
            id: inner.next_id(),
            name: name.to_string(),
            parent_id,
        };
        inner.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        Ok(self.inner.read().await.groups.get(&id).cloned())
    }

    async fn update_group(
        &self,
        id: GroupId,
        name: &str,
        parent_id: Option<GroupId>,
    ) -> StoreResult<Group> {
        let mut inner = self.inner.write().await;
        let old = inner
            .groups
            .get(&id)
            .map(|g| g.name.clone())
            .ok_or_else(|| StoreError::not_found("group", id))?;
        if inner.groups.values().any(|g| g.name == name && g.id != id) {
            return Err(StoreError::Conflict(format!("group '{name}' exists")));
        }
        inner.check_group_ancestry(id, parent_id)?;

        for principal in inner.principals.values_mut() {
            for group in principal.groups.iter_mut().filter(|g| **g == old) {
                *group = name.to_string();
            }
            principal.groups.sort();
        }
        let group = Group {
            id,
            name: name.to_string(),
            parent_id,
        };
        inner.groups.insert(id, group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: GroupId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("group", id))?;
        for child in inner.groups.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
        for principal in inner.principals.values_mut() {
            principal.groups.retain(|g| *g != group.name);
        }
        Ok(())
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        Ok(self.inner.read().await.groups.values().cloned().collect())
    }

    async fn ensure_group(&self, name: &str) -> StoreResult<Group> {
        let mut inner = self.inner.write().await;
        if let Some(group) = inner.groups.values().find(|g| g.name == name) {
            return Ok(group.clone());
        }
        let group = Group {
            id: inner.next_id(),
            name: name.to_string(),
            parent_id: None,
        };
        inner.groups.insert(group.id, group.clone());
        Ok(group)
    }
}
