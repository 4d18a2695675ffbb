use std::io;
use thiserror::Error;

use domain::error::DomainError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Unknown preset: {preset_id}")]
    UnknownPreset { preset_id: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Insufficient credits: required {required}, available {balance}")]
    InsufficientCredits { balance: i64, required: i64 },

    #[error("Promo code already redeemed")]
    AlreadyRedeemed,

    #[error("Provider submission failed: {details}")]
    ProviderSubmissionFailed { details: String },

    #[error("Provider status unavailable: {message}")]
    ProviderTransient { message: String },

    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("External service error: {message}")]
    ExternalServiceError { message: String },

    #[error("Internal server error")]
    InternalServerError,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Unauthorized")]
    Unauthorized,
}

pub type AppResult<T> = Result<T, AppError>;
