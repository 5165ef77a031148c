use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::user::User;
use crate::state::AppState;
use crate::users::UserPayload;

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User {id} not found"))
}

/// GET /api/users
pub async fn handle_list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.store.list_users().await?))
}

/// POST /api/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UserPayload>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let new_user = payload.into_new_user()?;
    let user = state.store.create_user(&new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(Json(user))
}

/// PUT /api/users/:id
///
/// Partial update: fields left out of the body keep their current value.
pub async fn handle_update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserPayload>,
) -> Result<Json<User>, AppError> {
    let changes = payload.into_changes()?;
    let user = state
        .store
        .update_user(id, &changes)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    info!("Updated user {id}");
    Ok(Json(user))
}

/// DELETE /api/users/:id
pub async fn handle_delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_user(id).await? {
        return Err(user_not_found(id));
    }
    info!("Deleted user {id}");
    Ok(Json(json!({ "message": "User deleted", "id": id })))
}
