use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::booking::BookingStatus;

/// Classified failures crossing the service boundary.
///
/// A duplicate submission is deliberately absent here: the reconciler treats
/// it as success and hands back the existing record.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("callback failed integrity verification")]
    Integrity,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("gateway timeout")]
    UpstreamTimeout,

    #[error("gateway rejected the request: {0}")]
    Upstream(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("status transition {from} -> {to} is not allowed")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("storage unavailable: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl PaymentError {
    pub fn persistence(e: impl Into<anyhow::Error>) -> Self {
        PaymentError::Persistence(e.into())
    }

    /// Retryable errors had no durable side effect yet; the caller may safely
    /// resubmit. Integrity failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::UpstreamTimeout | PaymentError::Persistence(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorPayload {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            PaymentError::Integrity => (StatusCode::BAD_REQUEST, "POSSIBLE_TAMPERING"),
            PaymentError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            PaymentError::UpstreamTimeout => (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT"),
            PaymentError::Upstream(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            PaymentError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            PaymentError::Persistence(e) => {
                tracing::error!("storage unavailable: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_UNAVAILABLE")
            }
        };

        let message = match &self {
            // Never leak storage internals to the client.
            PaymentError::Persistence(_) => "storage unavailable".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorEnvelope::new(code, &message))).into_response()
    }
}
