//! HTTP error mapping

use aqademiq_domain::AqademiqError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Error returned by API handlers; wraps the domain error for status
/// mapping.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AqademiqError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AqademiqError::NotFound(_) => StatusCode::NOT_FOUND,
            AqademiqError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AqademiqError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AqademiqError::Auth(_) => StatusCode::UNAUTHORIZED,
            // A failed provider write keeps the conflict pending; the caller
            // can retry the resolution.
            AqademiqError::RemoteWrite(_) | AqademiqError::Network(_) => StatusCode::BAD_GATEWAY,
            AqademiqError::Database(_)
            | AqademiqError::Config(_)
            | AqademiqError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody { error: self.to_string() };
        (status, Json(body)).into_response()
    }
}
