use std::sync::Arc;

use crate::domain::order::SaleTotals;
use crate::domain::payment::{
    GatewayKind, InitiateCheckoutRequest, InitiateCheckoutResponse, PaymentIntent, PurchaseKind,
    CURRENCY,
};
use crate::error::PaymentError;
use crate::gateways::gvp::GvpGateway;
use crate::gateways::iyzico::IyzicoGateway;
use crate::gateways::{InitiateOutcome, PaymentGateway};

/// Payment initiation: validate the checkout request, hand it to the right
/// gateway adapter, shape the response. Nothing is persisted on this path; a
/// failed or timed-out initiation is always safe to retry.
#[derive(Clone)]
pub struct CheckoutService {
    pub gvp: Arc<GvpGateway>,
    pub iyzico: Arc<IyzicoGateway>,
}

impl CheckoutService {
    pub async fn initiate(
        &self,
        req: InitiateCheckoutRequest,
    ) -> Result<InitiateCheckoutResponse, PaymentError> {
        validate_request(&req)?;

        let gateway_kind = req.gateway_kind;
        let intent = PaymentIntent {
            order_id: req.order_id,
            amount_minor: req.amount_minor,
            currency: req.currency,
            customer: req.customer,
            purchase: req.purchase,
            gateway_kind,
        };

        let outcome = match gateway_kind {
            GatewayKind::VirtualPos => self.gvp.initiate(&intent).await?,
            GatewayKind::CheckoutForm => self.iyzico.initiate(&intent).await?,
        };

        Ok(match outcome {
            InitiateOutcome::Redirect(redirect) => InitiateCheckoutResponse {
                gateway: gateway_kind,
                redirect: Some(redirect),
                form_token: None,
            },
            InitiateOutcome::FormToken { token } => InitiateCheckoutResponse {
                gateway: gateway_kind,
                redirect: None,
                form_token: Some(token),
            },
        })
    }
}

pub fn validate_request(req: &InitiateCheckoutRequest) -> Result<(), PaymentError> {
    if req.order_id.trim().is_empty() {
        return Err(PaymentError::InvalidRequest("order_id must not be empty".into()));
    }
    if req.amount_minor <= 0 {
        return Err(PaymentError::InvalidRequest("amount_minor must be > 0".into()));
    }
    if req.currency != CURRENCY {
        return Err(PaymentError::InvalidRequest(format!(
            "only {CURRENCY} is supported"
        )));
    }

    match &req.purchase {
        PurchaseKind::Booking(details) => {
            if details.end_time <= details.start_time {
                return Err(PaymentError::InvalidRequest(
                    "slot end must be after slot start".into(),
                ));
            }
            if details.people <= 0 {
                return Err(PaymentError::InvalidRequest("people must be > 0".into()));
            }
        }
        PurchaseKind::Tickets(details) => {
            if details.lines.is_empty() {
                return Err(PaymentError::InvalidRequest(
                    "ticket order must contain at least one line".into(),
                ));
            }
            if details.lines.iter().any(|l| l.quantity <= 0 || l.unit_price_minor < 0) {
                return Err(PaymentError::InvalidRequest(
                    "ticket lines must have positive quantity and non-negative price".into(),
                ));
            }
            let totals = SaleTotals::from_lines(&details.lines);
            if totals.amount_minor != req.amount_minor {
                return Err(PaymentError::InvalidRequest(
                    "ticket lines do not sum to the charged amount".into(),
                ));
            }
        }
    }

    Ok(())
}
