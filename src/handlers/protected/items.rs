// handlers/protected/items.rs - Item writes and the claim workflow
//
// POST /api/items, PUT|DELETE /api/items/:id, POST /api/items/:id/{claim,unclaim,resolve,verify}

use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::extract::{parse_id, ItemForm, JsonBody};
use crate::middleware::{ApiResponse, AuthUser};
use crate::services::item_service::given_rating;
use crate::state::AppState;

const INVALID_ITEM_ID: &str = "Invalid item ID format";

#[derive(Debug, Default, Deserialize)]
pub struct ResolveBody {
    #[serde(rename = "givenRating")]
    pub given_rating: Option<Value>,
}

/**
 * POST /api/items - Report a lost or found item
 *
 * Accepts multipart (`images` files, at most 5) or JSON. Required: `title`, `description`,
 * `type`, `location.name`, `dateOccurred`.
 *
 * Output (201): `{ "success": true, "message": "Item posted successfully", "item": { ... } }`
 */
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    ItemForm(input): ItemForm,
) -> Result<ApiResponse<Value>, ApiError> {
    let item = state
        .items
        .create(auth.user_id, input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while creating item"))?;

    Ok(ApiResponse::created("Item posted successfully", json!({ "item": item })))
}

/// PUT /api/items/:id - Reporter only. New images replace the old ones.
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ItemForm(input): ItemForm,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_ITEM_ID)?;
    let item = state
        .items
        .update(auth.user_id, id, input)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while updating item"))?;

    Ok(ApiResponse::with_message("Item updated successfully", json!({ "item": item })))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_ITEM_ID)?;
    state
        .items
        .delete(auth.user_id, id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while deleting item"))?;

    Ok(ApiResponse::message_only("Item deleted successfully"))
}

pub async fn claim(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_ITEM_ID)?;
    let item = state
        .items
        .claim(auth.user_id, id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while claiming item"))?;

    Ok(ApiResponse::with_message(
        "Item claimed successfully. Contact the poster to verify.",
        json!({ "item": item }),
    ))
}

pub async fn unclaim(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_ITEM_ID)?;
    let item = state
        .items
        .unclaim(auth.user_id, id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while unclaiming item"))?;

    Ok(ApiResponse::with_message("Claim cancelled successfully", json!({ "item": item })))
}

/// POST /api/items/:id/resolve - Body `{ "givenRating": 5 }` is optional.
pub async fn resolve(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ResolveBody>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_ITEM_ID)?;
    let rating = given_rating(body.given_rating.as_ref());
    let item = state
        .items
        .resolve(auth.user_id, id, rating)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while resolving item"))?;

    Ok(ApiResponse::with_message("Item resolved successfully", json!({ "item": item })))
}

pub async fn verify(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, INVALID_ITEM_ID)?;
    let item = state
        .items
        .verify(auth.user_id, id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while verifying item"))?;

    Ok(ApiResponse::with_message("Item verified successfully", json!({ "item": item })))
}
