//! REST API module for HTTP endpoints
//!
//! Provides REST endpoints for the per-game message log:
//! - `POST /api/v1/:game/messages` - Append a message
//! - `GET /api/v1/:game/messages` - Read a seq range

pub mod messages;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::message_store::StoreError;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Total count (for list responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, total: None }
    }

    pub fn with_total(data: T, total: usize) -> Self {
        Self {
            data,
            total: Some(total),
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: message.into(),
            code: "STORAGE_UNAVAILABLE".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidInput(_) => ApiError::bad_request(e.to_string()),
            StoreError::StorageUnavailable(_) => ApiError::storage_unavailable(e.to_string()),
            StoreError::SequenceConflict { .. } => ApiError::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_status_codes() {
        let invalid: ApiError = StoreError::InvalidInput("empty".to_string()).into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code, "BAD_REQUEST");

        let down: ApiError = StoreError::StorageUnavailable("disk".to_string()).into();
        assert_eq!(down.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.code, "STORAGE_UNAVAILABLE");

        let conflict: ApiError = StoreError::SequenceConflict {
            game: "chess".to_string(),
            seq: 0,
        }
        .into();
        assert_eq!(conflict.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_omits_status() {
        let json = serde_json::to_value(ApiError::bad_request("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "nope", "code": "BAD_REQUEST"}));
    }
}
