use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// The closed set of failures a payment request can surface. Causes are
/// carried for logging only; response bodies expose the display message.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("too many requests")]
    TooManyRequests,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PaymentError::Unauthorized => StatusCode::UNAUTHORIZED,
            PaymentError::NotFound => StatusCode::NOT_FOUND,
            PaymentError::Conflict => StatusCode::CONFLICT,
            PaymentError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
