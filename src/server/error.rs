//! Webhook error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors that end a webhook request. The display text is the response body.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook authentication not configured")]
    NotConfigured,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Rate limit exceeded")]
    RateLimited,

    /// A required write failed; the provider is expected to retry.
    #[error("{0}")]
    Persistence(&'static str),

    #[error("Internal server error")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::NotConfigured
            | WebhookError::Persistence(_)
            | WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WebhookError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebhookError::NotFound(_) => StatusCode::NOT_FOUND,
            WebhookError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            WebhookError::Internal(detail) => tracing::error!("Webhook failed: {}", detail),
            _ if status.is_server_error() => tracing::error!("Webhook failed: {}", self),
            _ => tracing::warn!("Webhook rejected ({}): {}", status.as_u16(), self),
        }

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
