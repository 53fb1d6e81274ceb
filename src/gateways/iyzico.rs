use serde::Deserialize;
use serde_json::json;

use crate::config::CheckoutFormConfig;
use crate::domain::order::SaleLine;
use crate::domain::payment::{
    CustomerInfo, OrderDetails, PaymentIntent, PurchaseKind, VerifiedPaymentResult,
};
use crate::error::PaymentError;
use crate::gateways::{InitiateOutcome, PaymentGateway};

const PAYMENT_SUCCESS: &str = "SUCCESS";

/// Hosted checkout form adapter. The provider renders the payment form; our
/// callback receives only a token which is resolved by a retrieve call.
///
/// Integrity note: there is no merchant-side digest on this path. Trust rests
/// entirely on the opacity of the provider token, which is a weaker boundary
/// than the virtual POS digest; every retrieve is traced under the security
/// target so the asymmetry stays visible in the logs.
pub struct IyzicoGateway {
    pub config: CheckoutFormConfig,
    pub callback_url: String,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl PaymentGateway for IyzicoGateway {
    fn name(&self) -> &'static str {
        "iyzico"
    }

    async fn initiate(&self, intent: &PaymentIntent) -> Result<InitiateOutcome, PaymentError> {
        let details = match &intent.purchase {
            PurchaseKind::Tickets(details) => details,
            PurchaseKind::Booking(_) => {
                return Err(PaymentError::InvalidRequest(
                    "the hosted checkout form sells event tickets only".into(),
                ))
            }
        };

        let basket_items: Vec<serde_json::Value> = details
            .lines
            .iter()
            .map(|line| {
                json!({
                    "id": line.ticket_id,
                    "name": line.ticket_name,
                    "category1": details.event_id,
                    "category2": details.event_slug,
                    "price": line.amount_minor(),
                    "quantity": line.quantity,
                })
            })
            .collect();

        let body = json!({
            "locale": "en",
            "conversationId": intent.order_id,
            "price": intent.amount_minor,
            "paidPrice": intent.amount_minor,
            "currency": intent.currency,
            "basketId": intent.order_id,
            "callbackUrl": self.callback_url,
            "buyer": {
                "name": intent.customer.name,
                "email": intent.customer.email,
                "gsmNumber": intent.customer.phone,
            },
            "basketItems": basket_items,
        });

        let url = format!("{}/payment/iyzipos/checkoutform/initialize/ecom", self.config.base_url);
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.config.api_key, Some(&self.config.secret_key))
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
            .send()
            .await
            .map_err(classify_transport)?;

        if !resp.status().is_success() {
            return Err(PaymentError::Upstream(format!(
                "checkout form initialize returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let parsed: InitializeResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;

        if parsed.status != "success" {
            return Err(PaymentError::Upstream(
                parsed
                    .error_message
                    .unwrap_or_else(|| "checkout form initialization failed".to_string()),
            ));
        }

        let token = parsed
            .token
            .ok_or_else(|| PaymentError::Upstream("initialize response missing token".into()))?;
        Ok(InitiateOutcome::FormToken { token })
    }
}

impl IyzicoGateway {
    /// Resolves a callback token into the payment result and the purchased
    /// basket. This is the token-opacity trust boundary.
    pub async fn retrieve(&self, token: &str) -> Result<RetrievedCheckout, PaymentError> {
        tracing::info!(
            target: "security",
            gateway = self.name(),
            "resolving callback via provider token lookup (no local digest on this path)"
        );

        let url = format!(
            "{}/payment/iyzipos/checkoutform/auth/ecom/detail",
            self.config.base_url
        );
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.config.api_key, Some(&self.config.secret_key))
            .json(&json!({ "locale": "en", "token": token }))
            .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
            .send()
            .await
            .map_err(classify_transport)?;

        if !resp.status().is_success() {
            return Err(PaymentError::Upstream(format!(
                "checkout form retrieve returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let parsed: RetrieveResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;
        if parsed.status != "success" {
            return Err(PaymentError::Upstream(
                parsed
                    .error_message
                    .unwrap_or_else(|| "token retrieve failed".to_string()),
            ));
        }

        let order_id = parsed
            .conversation_id
            .clone()
            .or_else(|| parsed.basket_id.clone())
            .ok_or_else(|| PaymentError::Upstream("retrieve response missing order id".into()))?;

        let success = parsed.payment_status.as_deref() == Some(PAYMENT_SUCCESS);
        let lines: Vec<SaleLine> = parsed
            .basket_items
            .iter()
            .map(|item| SaleLine {
                ticket_id: item.id.clone(),
                ticket_name: item.name.clone(),
                unit_price_minor: if item.quantity > 0 {
                    item.price / item.quantity
                } else {
                    item.price
                },
                quantity: item.quantity.max(1),
            })
            .collect();

        let (event_id, event_slug) = parsed
            .basket_items
            .first()
            .map(|item| (item.category1.clone(), item.category2.clone()))
            .unwrap_or_default();

        Ok(RetrievedCheckout {
            result: VerifiedPaymentResult {
                order_id,
                amount_minor: parsed.paid_price.unwrap_or_default(),
                success,
                error_code: parsed.error_code,
                error_message: parsed.error_message,
                gateway_transaction_id: parsed.payment_id,
            },
            customer: CustomerInfo {
                name: parsed.buyer.as_ref().map(|b| b.name.clone()).unwrap_or_default(),
                email: parsed.buyer.as_ref().map(|b| b.email.clone()).unwrap_or_default(),
                phone: parsed.buyer.and_then(|b| b.gsm_number),
            },
            order: OrderDetails {
                event_id,
                event_slug,
                event_date: None,
                lines,
            },
        })
    }
}

/// A token retrieve that resolved: the payment result plus the basket needed
/// to reconcile an event order.
pub struct RetrievedCheckout {
    pub result: VerifiedPaymentResult,
    pub customer: CustomerInfo,
    pub order: OrderDetails,
}

fn classify_transport(e: reqwest::Error) -> PaymentError {
    if e.is_timeout() {
        PaymentError::UpstreamTimeout
    } else {
        PaymentError::Upstream(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse {
    status: String,
    token: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    status: String,
    payment_status: Option<String>,
    conversation_id: Option<String>,
    basket_id: Option<String>,
    paid_price: Option<i64>,
    payment_id: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    buyer: Option<RetrievedBuyer>,
    #[serde(default)]
    basket_items: Vec<RetrievedBasketItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievedBuyer {
    name: String,
    email: String,
    gsm_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievedBasketItem {
    id: String,
    name: String,
    #[serde(default)]
    category1: String,
    #[serde(default)]
    category2: String,
    price: i64,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}
