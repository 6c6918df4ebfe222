// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::auth::{PasswordError, TokenError};
use crate::database::StoreError;
use crate::media::MediaError;

/// Internal failure text attached to a response as an extension. The error-detail middleware
/// copies it into the body in development mode and drops it otherwise.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<BTreeMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError {
        message: String,
        detail: Option<String>,
    },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError { message, .. } => message,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "message": self.message(),
        });
        if let ApiError::ValidationError {
            field_errors: Some(field_errors),
            ..
        } = self
        {
            body["errors"] = json!(field_errors);
        }
        body
    }

    /// Replaces the generic message of an internal error with one naming the failed
    /// operation. Client errors pass through untouched.
    pub fn or_internal(self, message: impl Into<String>) -> Self {
        match self {
            ApiError::InternalServerError { detail, .. } => ApiError::InternalServerError {
                message: message.into(),
                detail,
            },
            other => other,
        }
    }

    /// Builds a validation error whose message is the first failure in `order`. Fields not
    /// listed follow in name order.
    pub fn from_validation(errors: &validator::ValidationErrors, order: &[&str]) -> Self {
        let mut field_errors = BTreeMap::new();
        for (field, list) in errors.field_errors() {
            if let Some(first) = list.first() {
                let text = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                field_errors.insert(field.to_string(), text);
            }
        }

        let message = order
            .iter()
            .find_map(|field| field_errors.get(*field))
            .or_else(|| field_errors.values().next())
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_string());

        ApiError::ValidationError {
            message,
            field_errors: Some(field_errors),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError {
            message: message.into(),
            detail: None,
        }
    }

    pub fn internal_with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::InternalServerError {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            other => {
                // Log the real error but return generic message
                tracing::error!("Store error: {}", other);
                ApiError::internal_with_detail("Internal server error", other.to_string())
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        tracing::error!("Media error: {}", err);
        ApiError::internal_with_detail("Internal server error", err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!("Password error: {}", err);
        ApiError::internal_with_detail("Internal server error", err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Generation(msg) => {
                tracing::error!("Token generation failed: {}", msg);
                ApiError::internal_with_detail("Internal server error", msg)
            }
            TokenError::Expired | TokenError::Invalid | TokenError::WrongKind => {
                ApiError::forbidden("Invalid or expired token")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = self.to_json();
        let mut response = (status, Json(body)).into_response();
        if let ApiError::InternalServerError {
            detail: Some(detail), ..
        } = self
        {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

/// Adds `error` to an envelope body. Used by the development error-detail layer.
pub fn with_detail(mut body: Value, detail: &str) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("error".to_string(), Value::String(detail.to_string()));
        return body;
    }
    let mut map = Map::new();
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("error".to_string(), Value::String(detail.to_string()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
        name: String,
        #[validate(email(message = "Invalid email format"))]
        email: String,
    }

    #[test]
    fn envelope_carries_message() {
        let err = ApiError::not_found("Item not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_json(), json!({"success": false, "message": "Item not found"}));
    }

    #[test]
    fn validation_message_follows_requested_order() {
        let errors = Signup {
            name: "a".into(),
            email: "nope".into(),
        }
        .validate()
        .unwrap_err();

        let err = ApiError::from_validation(&errors, &["name", "email"]);
        assert_eq!(err.message(), "Name must be at least 2 characters");
        let err = ApiError::from_validation(&errors, &["email", "name"]);
        assert_eq!(err.message(), "Invalid email format");
        assert_eq!(err.to_json()["errors"]["name"], "Name must be at least 2 characters");
    }

    #[test]
    fn or_internal_only_touches_server_errors() {
        let err = ApiError::internal_with_detail("Internal server error", "boom").or_internal("Server error while creating item");
        assert_eq!(err.message(), "Server error while creating item");
        let err = ApiError::forbidden("nope").or_internal("ignored");
        assert_eq!(err.message(), "nope");
    }

    #[test]
    fn store_conflict_maps_to_409() {
        let err: ApiError = StoreError::Conflict("email".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let err: ApiError = StoreError::Corrupt("bad row".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unavailable_store_is_an_internal_error() {
        let err: ApiError = StoreError::Unavailable("pool timed out".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal server error");
        let response = err.into_response();
        assert_eq!(
            response.extensions().get::<ErrorDetail>().map(|d| d.0.as_str()),
            Some("Store unavailable: pool timed out")
        );
    }

    #[test]
    fn internal_errors_carry_detail_extension() {
        let response = ApiError::internal_with_detail("Internal server error", "db down").into_response();
        assert_eq!(
            response.extensions().get::<ErrorDetail>().map(|d| d.0.as_str()),
            Some("db down")
        );
    }
}
