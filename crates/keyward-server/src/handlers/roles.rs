use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use keyward_core::{Role, RoleId};
use keyward_store::DirectoryStore;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub name: String,
}

fn checked_name(body: &RoleBody) -> Result<&str, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("role name must not be empty".into()));
    }
    Ok(name)
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(body): Json<RoleBody>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state.store.create_role(checked_name(&body)?).await?;
    tracing::info!(role_id = role.id, name = %role.name, "created role");
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
) -> Result<Json<Role>, ApiError> {
    state
        .store
        .find_role(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("role {id}")))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    Json(body): Json<RoleBody>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.store.rename_role(id, checked_name(&body)?).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete_role(id).await?;
    Ok(Json(json!({ "message": "Role deleted" })))
}

pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.store.list_roles().await?))
}
