use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::PaymentError;
use crate::AppState;

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> impl IntoResponse {
    match state.event_orders_repo.find_by_order_id(&order_id).await {
        Ok(Some(order)) => (axum::http::StatusCode::OK, Json(order)).into_response(),
        Ok(None) => PaymentError::NotFound(format!("order {order_id}")).into_response(),
        Err(e) => PaymentError::persistence(e).into_response(),
    }
}
