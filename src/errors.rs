// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    ConfigurationError(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// Attached to error responses so the error responder can log and re-render
/// them with request context.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub stack: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConfigurationError(_) | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "ValidationError",
            AppError::ConfigurationError(_) => "ConfigError",
            AppError::Upstream(_) => "UpstreamError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        // Client errors on the request body are answered directly.
        if let AppError::ValidationError(_) = self {
            return (status, Json(json!({ "message": message }))).into_response();
        }

        let report = ErrorReport {
            stack: format!("{}: {}", self.kind(), message),
            message: message.clone(),
        };

        let mut response = (status, Json(json!({ "error": { "message": message } }))).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        AppError::Upstream(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_a_bare_message() {
        let response = AppError::invalid_data("Amount and phone number are required.").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ErrorReport>().is_none());
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Amount and phone number are required." })
        );
    }

    #[tokio::test]
    async fn upstream_error_uses_envelope_and_report() {
        let response = AppError::upstream("Failed to initiate STK Push.").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().cloned().unwrap();
        assert_eq!(report.stack, "UpstreamError: Failed to initiate STK Push.");
        assert_eq!(
            body_json(response).await,
            json!({ "error": { "message": "Failed to initiate STK Push." } })
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(AppError::not_found("gone").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::configuration("missing").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
