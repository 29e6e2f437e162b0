//! HTTP error mapping
//!
//! | Error                 | Status |
//! |-----------------------|--------|
//! | `Validation`          | 400    |
//! | `NotFound`            | 404    |
//! | `LockTimeout`         | 503    |
//! | anything else         | 500    |
//!
//! Bodies are the error message as plain text.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::CollectError;

/// Failure of a single request
#[derive(Debug)]
pub enum ApiError {
    /// The store refused or failed the operation
    Store(CollectError),

    /// Malformed path or query parameters
    BadRequest(String),

    /// The JSON body could not be extracted
    Body(JsonRejection),
}

impl From<CollectError> for ApiError {
    fn from(err: CollectError) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

/// Status code for a store error
pub fn status_for(err: &CollectError) -> StatusCode {
    match err {
        CollectError::Validation(_) => StatusCode::BAD_REQUEST,
        CollectError::NotFound(_) => StatusCode::NOT_FOUND,
        CollectError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Store(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", err);
                } else {
                    tracing::debug!("Request rejected: {}", err);
                }
                (status, err.to_string()).into_response()
            }
            ApiError::BadRequest(message) => {
                tracing::debug!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            ApiError::Body(rejection) => {
                tracing::error!("Could not parse user data: {}", rejection.body_text());
                // Well-formed JSON of the wrong shape is still a bad request
                let status = match rejection.status() {
                    StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
                    other => other,
                };
                (status, rejection.body_text()).into_response()
            }
        }
    }
}
