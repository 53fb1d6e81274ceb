use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::PaymentError;
use crate::AppState;

pub async fn get_event_rollup(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    match state.rollups_repo.get(&event_id).await {
        Ok(Some(view)) => (axum::http::StatusCode::OK, Json(view)).into_response(),
        Ok(None) => PaymentError::NotFound(format!("rollup for event {event_id}")).into_response(),
        Err(e) => PaymentError::persistence(e).into_response(),
    }
}
