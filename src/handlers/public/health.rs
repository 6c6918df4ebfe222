// handlers/public/health.rs - GET /api/health

use crate::middleware::ApiResponse;
use serde_json::Value;

/// Liveness check. Does not touch the store.
pub async fn health() -> ApiResponse<Value> {
    ApiResponse::message_only("Server is running")
}
