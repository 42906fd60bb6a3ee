//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::BoardError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors returned by API handlers
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Board(#[from] BoardError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Board(err) => match err {
                BoardError::NotFound(_) => StatusCode::NOT_FOUND,
                BoardError::Conflict(_) => StatusCode::CONFLICT,
                BoardError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
                BoardError::FetchError { .. } | BoardError::Timeout(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (code, Json(body)).into_response()
    }
}
