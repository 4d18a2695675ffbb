use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error};

use reelforge_application::error::AppError;

pub struct HttpError(pub AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        match app_error {
            AppError::Domain(_)
            | AppError::UnknownPreset { .. }
            | AppError::InvalidParameters { .. }
            | AppError::InsufficientCredits { .. }
            | AppError::AlreadyRedeemed
            | AppError::ValidationError { .. }
            | AppError::JsonError(_)
            | AppError::NotFound { .. }
            | AppError::Unauthorized => {
                debug!("Client error response generated: {}", app_error);
            }
            _ => {
                error!("Server error response generated: {}", app_error);
            }
        }

        // Insufficient credits carries structured fields so the frontend can
        // show what is missing.
        if let AppError::InsufficientCredits { balance, required } = app_error {
            let body = json!({
                "ok": false,
                "error": "Not enough credits",
                "status": StatusCode::PAYMENT_REQUIRED.as_u16(),
                "credits": balance,
                "required": required
            });
            return (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response();
        }

        let (status_code, message) = match app_error {
            AppError::Domain(_) | AppError::UnknownPreset { .. } | AppError::InvalidParameters { .. } => {
                (StatusCode::BAD_REQUEST, app_error.to_string())
            }

            AppError::ValidationError { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, app_error.to_string())
            }

            AppError::AlreadyRedeemed => (StatusCode::CONFLICT, app_error.to_string()),

            AppError::ProviderSubmissionFailed { .. } => {
                (StatusCode::BAD_GATEWAY, app_error.to_string())
            }

            AppError::ProviderTransient { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Provider status temporarily unavailable".to_string(),
            ),

            AppError::JsonError(_) => (StatusCode::BAD_REQUEST, "Invalid JSON format".to_string()),

            AppError::ConfigError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),

            AppError::IoError(_) | AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),

            AppError::DatabaseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),

            AppError::StorageFailure { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error".to_string(),
            ),

            AppError::ExternalServiceError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "External service error".to_string(),
            ),

            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),

            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),

            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message.clone()),

            AppError::InsufficientCredits { .. } => {
                (StatusCode::PAYMENT_REQUIRED, app_error.to_string())
            }
        };

        let error_response = json!({
            "ok": false,
            "error": message,
            "status": status_code.as_u16()
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<AppError> for HttpError {
    fn from(app_error: AppError) -> Self {
        HttpError(app_error)
    }
}
