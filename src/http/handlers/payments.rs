use axum::extract::State;
use axum::response::{IntoResponse, Redirect};
use axum::{Form, Json};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::payment::{InitiateCheckoutRequest, PurchaseKind, VerifiedPaymentResult};
use crate::error::PaymentError;
use crate::service::reconciler::Reconciliation;
use crate::{AppState, RedirectTargets};

pub async fn initiate(
    State(state): State<AppState>,
    Json(req): Json<InitiateCheckoutRequest>,
) -> impl IntoResponse {
    match state.checkout.initiate(req).await {
        Ok(resp) => (axum::http::StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Signed success callback from the virtual POS. Gateway-originated, so the
/// response is always a redirect; payload fields are never rendered back.
pub async fn gvp_callback_success(
    State(state): State<AppState>,
    Form(form): Form<BTreeMap<String, String>>,
) -> Redirect {
    let callback = state.gvp.parse_callback(form);
    let result = match state.gvp.verified_result(&callback) {
        Ok(result) => result,
        Err(PaymentError::Integrity) => return state.urls.failure("rejected", None),
        Err(_) => return state.urls.failure("malformed", None),
    };

    if !result.success {
        return state.urls.failure(
            result.error_message.as_deref().unwrap_or("declined"),
            result.error_code.as_deref(),
        );
    }

    let customer = state.gvp.customer_from_callback(&callback);
    match state.gvp.purchase_from_callback(&callback) {
        Ok(PurchaseKind::Booking(details)) => finish(
            &state.urls,
            &result,
            state
                .reconciler
                .reconcile_booking(&result, &customer, &details)
                .await,
        ),
        Ok(PurchaseKind::Tickets(details)) => finish(
            &state.urls,
            &result,
            state
                .reconciler
                .reconcile_order(&result, &customer, &details)
                .await,
        ),
        Err(_) => state.urls.failure("malformed", None),
    }
}

/// Signed error callback from the virtual POS. Verified like the success
/// path; a forged decline must not be able to show gateway error details.
pub async fn gvp_callback_error(
    State(state): State<AppState>,
    Form(form): Form<BTreeMap<String, String>>,
) -> Redirect {
    let callback = state.gvp.parse_callback(form);
    match state.gvp.verified_result(&callback) {
        Ok(result) => state.urls.failure(
            result.error_message.as_deref().unwrap_or("payment failed"),
            result.error_code.as_deref(),
        ),
        Err(PaymentError::Integrity) => state.urls.failure("rejected", None),
        Err(_) => state.urls.failure("malformed", None),
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutFormCallback {
    pub token: String,
}

/// Hosted checkout form callback: the provider posts a token which is
/// resolved by a retrieve call before anything is trusted.
pub async fn checkout_form_callback(
    State(state): State<AppState>,
    Form(cb): Form<CheckoutFormCallback>,
) -> Redirect {
    let retrieved = match state.iyzico.retrieve(&cb.token).await {
        Ok(retrieved) => retrieved,
        Err(PaymentError::UpstreamTimeout) => return state.urls.failure("gateway-timeout", None),
        Err(_) => return state.urls.failure("rejected", None),
    };

    if !retrieved.result.success {
        return state.urls.failure(
            retrieved.result.error_message.as_deref().unwrap_or("declined"),
            retrieved.result.error_code.as_deref(),
        );
    }

    finish(
        &state.urls,
        &retrieved.result,
        state
            .reconciler
            .reconcile_order(&retrieved.result, &retrieved.customer, &retrieved.order)
            .await,
    )
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

fn finish<T>(
    urls: &RedirectTargets,
    result: &VerifiedPaymentResult,
    outcome: Result<Reconciliation<T>, PaymentError>,
) -> Redirect {
    match outcome {
        Ok(Reconciliation::Recorded(_)) | Ok(Reconciliation::AlreadyRecorded(_)) => {
            urls.confirmation(&result.order_id, result.amount_minor)
        }
        Ok(Reconciliation::Declined { code, message }) => {
            urls.failure(message.as_deref().unwrap_or("declined"), code.as_deref())
        }
        // Storage hiccup: the record may not exist yet, but replaying the
        // callback is safe. Park the customer on the processing page.
        Err(e) if e.is_retryable() => urls.processing(&result.order_id),
        Err(_) => urls.failure("rejected", None),
    }
}
