use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::any::Any;

use crate::error::{with_detail, ApiError, ErrorDetail};
use crate::state::AppState;

const MAX_ERROR_BODY: usize = 64 * 1024;

/// Copies internal error detail into the response body in development. Elsewhere the
/// detail extension is stripped and the body is left as is.
pub async fn error_detail_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };
    if !state.config.is_development() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not buffer error body: {}", e);
            return ApiError::internal_server_error("Internal server error").into_response();
        }
    };
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let enriched = match serde_json::to_vec(&with_detail(body, &detail)) {
        Ok(enriched) => enriched,
        Err(_) => bytes.to_vec(),
    };

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(enriched))
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);
    ApiError::internal_with_detail("Internal server error", detail).into_response()
}

pub async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
