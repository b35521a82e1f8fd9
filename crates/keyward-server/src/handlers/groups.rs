use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use keyward_core::{Group, GroupId};
use keyward_store::DirectoryStore;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct GroupBody {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

impl GroupBody {
    fn checked_name(&self) -> Result<&str, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("group name must not be empty".into()));
        }
        Ok(name)
    }
}

pub async fn create_group(
    State(state): State<AppState>,
    Json(body): Json<GroupBody>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = state
        .store
        .create_group(body.checked_name()?, body.parent_id)
        .await?;
    tracing::info!(group_id = group.id, name = %group.name, "created group");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
) -> Result<Json<Group>, ApiError> {
    state
        .store
        .find_group(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("group {id}")))
}

pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    Json(body): Json<GroupBody>,
) -> Result<Json<Group>, ApiError> {
    let group = state
        .store
        .update_group(id, body.checked_name()?, body.parent_id)
        .await?;
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete_group(id).await?;
    Ok(Json(json!({ "message": "Group deleted" })))
}

pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.store.list_groups().await?))
}
