use crate::error::{ApiError, membership_error};
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use keyward_auth::{AuthError, Authorized, Registration};
use keyward_core::{KeyPairRecord, Principal, PrincipalId, PrincipalUpdate};
use keyward_store::{CredentialStore, DirectoryStore};
use keyward_token::Claims;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// =============================================================================
// VIEWS
// =============================================================================

/// Public half of a key pair. Private material never leaves the store.
#[derive(Debug, Serialize)]
pub struct KeyView {
    pub id: i64,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl From<KeyPairRecord> for KeyView {
    fn from(key: KeyPairRecord) -> Self {
        Self {
            id: key.id,
            public_key: key.public_key_pem,
            created_at: key.created_at,
            expires_at: key.expires_at,
            active: key.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
}

impl From<&Principal> for UserSummary {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            username: p.name.clone(),
            email: p.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub key: Option<KeyView>,
}

impl UserView {
    fn new(p: Principal, key: Option<KeyPairRecord>) -> Self {
        Self {
            id: p.id,
            username: p.name,
            email: p.email,
            roles: p.roles,
            groups: p.groups,
            key: key.map(KeyView::from),
        }
    }
}

async fn user_view(state: &AppState, principal: Principal) -> Result<UserView, ApiError> {
    let key = state.store.find_active_key(principal.id).await?;
    Ok(UserView::new(principal, key))
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, rename = "forceTokenGen")]
    pub force_token_gen: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let principal = state
        .accounts
        .register(Registration {
            name: body.username,
            email: body.email,
            password: body.password,
            roles: body.roles,
            groups: body.groups,
        })
        .await
        .map_err(|e| match e {
            AuthError::Store(e) => membership_error(e),
            other => other.into(),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": UserSummary::from(&principal),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let issued = state
        .accounts
        .login(&body.email, &body.password, body.force_token_gen)
        .await?;

    tracing::info!(
        principal_id = issued.claims.user_id,
        reused = issued.reused,
        "login succeeded"
    );
    let message = if issued.reused {
        "Login successful (existing token)"
    } else {
        "Login successful"
    };
    Ok(Json(LoginResponse {
        message,
        token: issued.token,
        claims: issued.claims,
    }))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let principals = state.store.list_principals().await?;
    let mut users = Vec::with_capacity(principals.len());
    for principal in principals {
        users.push(user_view(&state, principal).await?);
    }
    Ok(Json(json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<PrincipalId>,
) -> Result<Json<UserView>, ApiError> {
    let principal = state
        .store
        .find_principal(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    Ok(Json(user_view(&state, principal).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<PrincipalId>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, ApiError> {
    if body.email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::BadRequest("email is not valid".into()));
    }
    let update = PrincipalUpdate {
        name: body.username,
        email: body.email,
        roles: body.roles,
        groups: body.groups,
    };
    let principal = state
        .store
        .update_principal(id, update)
        .await
        .map_err(membership_error)?;
    tracing::info!(principal_id = id, roles = ?principal.roles, "updated user");
    Ok(Json(user_view(&state, principal).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<PrincipalId>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete_principal(id).await?;
    tracing::info!(principal_id = id, "deleted user");
    Ok(Json(json!({ "message": "User deleted" })))
}

pub async fn rotate_key(
    State(state): State<AppState>,
    Path(id): Path<PrincipalId>,
) -> Result<Json<KeyView>, ApiError> {
    let key = state.accounts.rotate_key(id).await?;
    Ok(Json(key.into()))
}

/// Echo the verified caller.
pub async fn whoami(Extension(caller): Extension<Authorized>) -> Json<Value> {
    Json(json!({
        "user": UserSummary::from(&caller.principal),
        "roles": caller.principal.roles,
        "claims": caller.claims,
    }))
}
