//! SQLite-backed store.

use crate::error::{StoreError, StoreResult};
use crate::{CredentialStore, DirectoryStore, check_parent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_core::{
    Group, GroupId, KeyMaterial, KeyPairRecord, NewPrincipal, Principal, PrincipalId,
    PrincipalUpdate, Role, RoleId,
};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::path::Path;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str = "id, name, email, password_hash, token";
const KEY_COLUMNS: &str = "id, user_id, private_key, public_key, created_at, expires_at, is_active";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    token: Option<String>,
}

#[derive(FromRow)]
struct KeyRow {
    id: i64,
    user_id: i64,
    private_key: String,
    public_key: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_active: bool,
}

impl From<KeyRow> for KeyPairRecord {
    fn from(row: KeyRow) -> Self {
        KeyPairRecord {
            id: row.id,
            principal_id: row.user_id,
            private_key_pem: row.private_key,
            public_key_pem: row.public_key,
            created_at: row.created_at,
            expires_at: row.expires_at,
            active: row.is_active,
        }
    }
}

#[derive(Debug, FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    parent_id: Option<i64>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
        }
    }
}

/// A store persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path` and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database (one connection, kept alive for the
    /// lifetime of the pool).
    pub async fn in_memory() -> StoreResult<Self> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options.foreign_keys(true))
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and run migrations.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        MIGRATOR.run(&pool).await?;
        tracing::debug!("sqlite store migrations applied");
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn conflict_or_db(e: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(what());
        }
    }
    StoreError::Database(e)
}

async fn load_principal(conn: &mut SqliteConnection, row: UserRow) -> StoreResult<Principal> {
    let roles: Vec<String> = sqlx::query_scalar(
        "SELECT r.name FROM roles r JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = ? ORDER BY r.name",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let groups: Vec<String> = sqlx::query_scalar(
        "SELECT g.name FROM user_groups g JOIN user_group_members m ON m.group_id = g.id \
         WHERE m.user_id = ? ORDER BY g.name",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Principal {
        id: row.id,
        name: row.name,
        email: row.email,
        password_hash: row.password_hash,
        token: row.token,
        roles,
        groups,
    })
}

async fn fetch_principal(
    conn: &mut SqliteConnection,
    id: PrincipalId,
) -> StoreResult<Option<Principal>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    match row {
        Some(row) => Ok(Some(load_principal(conn, row).await?)),
        None => Ok(None),
    }
}

async fn resolve_ids(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    names: &[String],
) -> StoreResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id: Option<i64> = sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE name = ?"))
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        let id = id.ok_or_else(|| StoreError::not_found(entity, name))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

async fn replace_roles(
    conn: &mut SqliteConnection,
    user_id: PrincipalId,
    names: &[String],
) -> StoreResult<()> {
    let ids = resolve_ids(conn, "roles", "role", names).await?;
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    for role_id in ids {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn replace_groups(
    conn: &mut SqliteConnection,
    user_id: PrincipalId,
    names: &[String],
) -> StoreResult<()> {
    let ids = resolve_ids(conn, "user_groups", "group", names).await?;
    sqlx::query("DELETE FROM user_group_members WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    for group_id in ids {
        sqlx::query("INSERT INTO user_group_members (user_id, group_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_key(
    conn: &mut SqliteConnection,
    user_id: PrincipalId,
    key: KeyMaterial,
) -> StoreResult<KeyPairRecord> {
    let result = sqlx::query(
        "INSERT INTO key_pairs (user_id, private_key, public_key, created_at, expires_at, is_active) \
         VALUES (?, ?, ?, ?, ?, 1)",
    )
    .bind(user_id)
    .bind(&key.private_key_pem)
    .bind(&key.public_key_pem)
    .bind(key.created_at)
    .bind(key.expires_at)
    .execute(&mut *conn)
    .await?;

    Ok(KeyPairRecord::from_material(
        result.last_insert_rowid(),
        user_id,
        key,
    ))
}

async fn check_group_ancestry(
    conn: &mut SqliteConnection,
    id: GroupId,
    parent_id: Option<GroupId>,
) -> StoreResult<()> {
    check_parent(id, parent_id)?;
    let mut cursor = parent_id;
    while let Some(current) = cursor {
        let parent: Option<Option<i64>> =
            sqlx::query_scalar("SELECT parent_id FROM user_groups WHERE id = ?")
                .bind(current)
                .fetch_optional(&mut *conn)
                .await?;
        let parent = parent.ok_or_else(|| StoreError::not_found("group", current))?;
        if parent == Some(id) {
            return Err(StoreError::Invalid(format!(
                "group {id} would become its own ancestor"
            )));
        }
        cursor = parent;
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        let mut conn = self.pool.acquire().await?;
        fetch_principal(&mut conn, id).await
    }

    async fn find_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&mut *conn)
                .await?;
        match row {
            Some(row) => Ok(Some(load_principal(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_active_key(
        &self,
        principal_id: PrincipalId,
    ) -> StoreResult<Option<KeyPairRecord>> {
        let row: Option<KeyRow> = sqlx::query_as(&format!(
            "SELECT {KEY_COLUMNS} FROM key_pairs WHERE user_id = ? AND is_active = 1"
        ))
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(KeyPairRecord::from))
    }

    async fn swap_token(
        &self,
        principal_id: PrincipalId,
        expected: Option<&str>,
        new_token: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET token = ? WHERE id = ? AND token IS ?")
            .bind(new_token)
            .bind(principal_id)
            .bind(expected)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::not_found("user", principal_id)),
        }
    }
}

#[async_trait]
impl DirectoryStore for SqliteStore {
    async fn create_principal(
        &self,
        new: NewPrincipal,
        key: KeyMaterial,
    ) -> StoreResult<Principal> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or_db(e, || "user name or email is taken".to_string()))?;
        let id = result.last_insert_rowid();

        replace_roles(&mut tx, id, &new.roles).await?;
        replace_groups(&mut tx, id, &new.groups).await?;
        insert_key(&mut tx, id, key).await?;

        let principal = fetch_principal(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))?;
        tx.commit().await?;

        tracing::debug!(principal_id = id, "created principal");
        Ok(principal)
    }

    async fn update_principal(
        &self,
        id: PrincipalId,
        update: PrincipalUpdate,
    ) -> StoreResult<Principal> {
        let mut tx = self.pool.begin().await?;
        let current = fetch_principal(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))?;

        sqlx::query("UPDATE users SET name = ?, email = ? WHERE id = ?")
            .bind(update.name.as_deref().unwrap_or(&current.name))
            .bind(update.email.as_deref().unwrap_or(&current.email))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or_db(e, || "user name or email is taken".to_string()))?;

        if let Some(roles) = &update.roles {
            replace_roles(&mut tx, id, roles).await?;
        }
        if let Some(groups) = &update.groups {
            replace_groups(&mut tx, id, groups).await?;
        }

        let principal = fetch_principal(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))?;
        tx.commit().await?;
        Ok(principal)
    }

    async fn delete_principal(&self, id: PrincipalId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", id));
        }
        Ok(())
    }

    async fn list_principals(&self) -> StoreResult<Vec<Principal>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&mut *conn)
                .await?;
        let mut principals = Vec::with_capacity(rows.len());
        for row in rows {
            principals.push(load_principal(&mut conn, row).await?);
        }
        Ok(principals)
    }

    async fn rotate_key(
        &self,
        principal_id: PrincipalId,
        key: KeyMaterial,
    ) -> StoreResult<KeyPairRecord> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(principal_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("user", principal_id));
        }

        sqlx::query("UPDATE key_pairs SET is_active = 0 WHERE user_id = ?")
            .bind(principal_id)
            .execute(&mut *tx)
            .await?;
        let record = insert_key(&mut tx, principal_id, key).await?;
        tx.commit().await?;

        tracing::info!(principal_id, key_id = record.id, "rotated key pair");
        Ok(record)
    }

    async fn create_role(&self, name: &str) -> StoreResult<Role> {
        let result = sqlx::query("INSERT INTO roles (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_db(e, || format!("role '{name}' exists")))?;
        Ok(Role {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    async fn find_role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name.map(|name| Role { id, name }))
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> StoreResult<Role> {
        let result = sqlx::query("UPDATE roles SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_db(e, || format!("role '{name}' exists")))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("role", id));
        }
        Ok(Role {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("role", id));
        }
        Ok(())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| Role { id, name }).collect())
    }

    async fn ensure_role(&self, name: &str) -> StoreResult<Role> {
        sqlx::query("INSERT INTO roles (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Role {
            id,
            name: name.to_string(),
        })
    }

    async fn create_group(&self, name: &str, parent_id: Option<GroupId>) -> StoreResult<Group> {
        let mut conn = self.pool.acquire().await?;
        if let Some(parent) = parent_id {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM user_groups WHERE id = ?")
                .bind(parent)
                .fetch_optional(&mut *conn)
                .await?;
            if exists.is_none() {
                return Err(StoreError::not_found("group", parent));
            }
        }

        let result = sqlx::query("INSERT INTO user_groups (name, parent_id) VALUES (?, ?)")
            .bind(name)
            .bind(parent_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| conflict_or_db(e, || format!("group '{name}' exists")))?;
        Ok(Group {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            parent_id,
        })
    }

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let row: Option<GroupRow> =
            sqlx::query_as("SELECT id, name, parent_id FROM user_groups WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Group::from))
    }

    async fn update_group(
        &self,
        id: GroupId,
        name: &str,
        parent_id: Option<GroupId>,
    ) -> StoreResult<Group> {
        let mut tx = self.pool.begin().await?;
        check_group_ancestry(&mut tx, id, parent_id).await?;

        let result = sqlx::query("UPDATE user_groups SET name = ?, parent_id = ? WHERE id = ?")
            .bind(name)
            .bind(parent_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or_db(e, || format!("group '{name}' exists")))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("group", id));
        }
        tx.commit().await?;

        Ok(Group {
            id,
            name: name.to_string(),
            parent_id,
        })
    }

    async fn delete_group(&self, id: GroupId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM user_groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("group", id));
        }
        Ok(())
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        let rows: Vec<GroupRow> =
            sqlx::query_as("SELECT id, name, parent_id FROM user_groups ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn ensure_group(&self, name: &str) -> StoreResult<Group> {
        sqlx::query("INSERT INTO user_groups (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let row: GroupRow =
            sqlx::query_as("SELECT id, name, parent_id FROM user_groups WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.into())
    }
}
