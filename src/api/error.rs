use crate::analysis::AnalysisError;
use crate::core::ChatError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Not found (404)
    NotFound(String),

    /// Internal server error (500)
    InternalError(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for JSON response
    pub fn error_code(&self) -> u32 {
        self.status_code().as_u16() as u32
    }

    pub fn message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::InternalError(msg) => msg.clone(),
        }
    }

    fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Request failed: {}", cause);
        Self::InternalError(format!("An error occurred: {}", cause))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message(),
            "error_code": self.error_code(),
        });

        (self.status_code(), axum::Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ConversationNotFound(_) => Self::NotFound(err.to_string()),
            err if err.is_client_error() => {
                tracing::warn!("Rejected request: {}", err);
                Self::BadRequest(err.to_string())
            }
            err => Self::internal(err),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::internal(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("JSON error: {}", rejection);
        Self::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::warn!("JSON error: {}", err);
        Self::BadRequest(format!("Invalid JSON: {}", err))
    }
}
