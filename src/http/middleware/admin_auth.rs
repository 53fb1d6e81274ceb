use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ErrorEnvelope;

const API_KEY_HEADER: &str = "X-Internal-Api-Key";

/// Guards venue-ops routes (booking status transitions). Rejections are
/// security events, not ordinary request errors.
pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if provided != expected {
        tracing::warn!(
            target: "security",
            path = %request.uri().path(),
            "admin route rejected: bad or missing internal API key"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorEnvelope::new("UNAUTHORIZED", "internal API key required")),
        )
            .into_response();
    }

    next.run(request).await
}
