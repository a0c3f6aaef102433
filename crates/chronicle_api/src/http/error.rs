use crate::domain::ApiError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::DomainError;
use serde::Serialize;
use tracing::{error, warn};

/// Convert domain error to HTTP status
pub fn domain_error_to_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::FieldTooLong(_) => StatusCode::BAD_REQUEST,
        DomainError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::StatementPreparation { .. }
        | DomainError::Query { .. }
        | DomainError::Transaction(_)
        | DomainError::RepositoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotEnabled => StatusCode::NOT_FOUND,
            ApiError::InvalidAuthHeader | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::InvalidBody(_) | ApiError::InvalidSerialCount => StatusCode::BAD_REQUEST,
            ApiError::Validation(e) | ApiError::Query(e) => domain_error_to_status(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "api error");
        } else {
            warn!(error = %self, status = status.as_u16(), "api error");
        }

        (
            status,
            Json(ErrorBody {
                status: status.as_u16(),
            }),
        )
            .into_response()
    }
}
