// handlers/public/items.rs - Item browsing
//
// GET /api/items, GET /api/items/search, GET /api/items/user/:userId, GET /api/items/:id

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::extract::{parse_id, QueryParams};
use crate::middleware::ApiResponse;
use crate::services::item_service::{ListQuery, SearchParams};
use crate::state::AppState;

/**
 * GET /api/items - Filtered, paginated listing, newest first
 *
 * Query: `type`, `category`, `isResolved`, `isVerified` (`"true"` or anything else for
 * false), `page` (default 1), `limit` (default 20).
 *
 * Output:
 * ```json
 * {
 *   "success": true,
 *   "items": [ { "id": "...", "reportedBy": { "id": "...", "name": "...", "rating": 0 }, "claimedBy": null } ],
 *   "pagination": { "total": 5, "page": 2, "limit": 2, "pages": 3 }
 * }
 * ```
 */
pub async fn list(State(state): State<AppState>, QueryParams(query): QueryParams<ListQuery>) -> Result<ApiResponse<Value>, ApiError> {
    let (items, pagination) = state
        .items
        .list(&query)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while fetching items"))?;

    Ok(ApiResponse::success(json!({ "items": items, "pagination": pagination })))
}

/// GET /api/items/search?q= - Title or description contains `q`, case-insensitive.
pub async fn search(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<ApiResponse<Value>, ApiError> {
    let items = state
        .items
        .search(&params)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while searching items"))?;

    let count = items.len();
    Ok(ApiResponse::success(json!({ "items": items, "count": count })))
}

pub async fn by_user(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let user_id = parse_id(&user_id, "Invalid user ID format")?;
    let items = state
        .items
        .by_reporter(user_id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while fetching user items"))?;

    let count = items.len();
    Ok(ApiResponse::success(json!({ "items": items, "count": count })))
}

/// GET /api/items/:id - Counts a view.
pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let id = parse_id(&id, "Invalid item ID format")?;
    let item = state
        .items
        .detail(id)
        .await
        .map_err(|e| ApiError::from(e).or_internal("Server error while fetching item"))?;

    Ok(ApiResponse::success(json!({ "item": item })))
}
