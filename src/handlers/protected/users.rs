// handlers/protected/users.rs - GET /api/users, GET|PUT|DELETE /api/users/:id

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::extract::{parse_id, UserForm};
use crate::middleware::{ApiResponse, AuthUser};
use crate::state::AppState;

const INVALID_USER_ID: &str = "Invalid user ID format";

pub async fn list(_auth: AuthUser, State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let users = state
        .users
        .list()
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while fetching users"))?;

    let count = users.len();
    Ok(ApiResponse::with_message(
        "Users retrieved successfully",
        json!({ "users": users, "count": count }),
    ))
}

pub async fn get(_auth: AuthUser, State(state): State<AppState>, Path(id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_USER_ID)?;
    let user = state
        .users
        .get(id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while fetching user"))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}

/**
 * PUT /api/users/:id - Edit your own profile
 *
 * Multipart fields `name`, `bio`, `link` and files `profileimg`, `coverimg`; or JSON with
 * the text fields.
 *
 * Output: `{ "success": true, "message": "User updated successfully", "user": { ... } }`
 */
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    UserForm(input): UserForm,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_USER_ID)?;
    let user = state
        .users
        .update(auth.user_id, id, input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while updating user"))?;

    Ok(ApiResponse::with_message("User updated successfully", json!({ "user": user })))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_USER_ID)?;
    state
        .users
        .delete(auth.user_id, id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while deleting user"))?;

    Ok(ApiResponse::message_only("User deleted successfully"))
}
