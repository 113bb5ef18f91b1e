//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::PasteError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl PasteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PasteError::Validation(_) => StatusCode::BAD_REQUEST,
            PasteError::NotFound => StatusCode::NOT_FOUND,
            PasteError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for PasteError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
