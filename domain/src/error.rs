use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid generation parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid job status: {0}")]
    InvalidJobStatus(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

pub type DomainResult<T> = Result<T, DomainError>;
