use common::domain::DomainError;
use thiserror::Error;

/// Failures surfaced by the HTTP endpoints
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("api not enabled")]
    NotEnabled,

    #[error("invalid auth header")]
    InvalidAuthHeader,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("could not parse body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("invalid serial count")]
    InvalidSerialCount,

    #[error("validation error: {0}")]
    Validation(#[source] DomainError),

    #[error("could not query database: {0}")]
    Query(#[source] DomainError),
}
