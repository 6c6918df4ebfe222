use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Success envelope: `{"success": true, "message"?: ..., ...payload}`.
///
/// The payload must serialize to a JSON object; its keys are merged into the envelope.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: Option<String>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
            status_code: StatusCode::OK,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            data,
            message: Some(message.into()),
            status_code: StatusCode::OK,
        }
    }

    /// Create a 201 Created response
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            data,
            message: Some(message.into()),
            status_code: StatusCode::CREATED,
        }
    }
}

impl ApiResponse<Value> {
    /// Envelope with a message and no payload.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self::with_message(message, json!({}))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "message": "Failed to serialize response data"
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = Map::new();
        envelope.insert("success".to_string(), Value::Bool(true));
        if let Some(message) = self.message {
            envelope.insert("message".to_string(), Value::String(message));
        }
        match data_value {
            Value::Object(fields) => envelope.extend(fields),
            Value::Null => {}
            other => {
                envelope.insert("data".to_string(), other);
            }
        }

        (self.status_code, Json(Value::Object(envelope))).into_response()
    }
}
