use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::SaleLine;

/// The single settlement currency and its ISO-4217 numeric code on the wire.
pub const CURRENCY: &str = "TRY";
pub const CURRENCY_CODE: &str = "949";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayKind {
    /// Hosted checkout form; callback is resolved by provider token lookup.
    CheckoutForm,
    /// 3D-secure redirect with a signed form POST callback.
    VirtualPos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    pub venue_tr: String,
    pub venue_en: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub people: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub event_id: String,
    pub event_slug: String,
    pub event_date: Option<chrono::DateTime<chrono::Utc>>,
    pub lines: Vec<SaleLine>,
}

/// What is being paid for. Echoed through the gateway so the callback can be
/// reconciled without any server-side session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseKind {
    Booking(BookingDetails),
    Tickets(OrderDetails),
}

/// One checkout attempt. Ephemeral: consumed by the gateway adapter and never
/// persisted.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: CustomerInfo,
    pub purchase: PurchaseKind,
    pub gateway_kind: GatewayKind,
}

/// Outcome of a callback that already passed integrity verification.
///
/// Invariant: values of this type exist only downstream of a successful
/// digest check (virtual POS) or provider token retrieve (checkout form).
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedPaymentResult {
    pub order_id: String,
    pub amount_minor: i64,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub gateway_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateCheckoutRequest {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: CustomerInfo,
    pub purchase: PurchaseKind,
    pub gateway_kind: GatewayKind,
}

#[derive(Debug, Serialize)]
pub struct InitiateCheckoutResponse {
    pub gateway: GatewayKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<crate::gateways::RedirectInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_token: Option<String>,
}

/// Exact minor→major conversion; the only place the division by 100 happens
/// is this two-decimal rescale.
pub fn minor_to_major(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, 2)
}

/// Major-unit rendering for redirect query strings, always two decimals.
pub fn format_major(amount_minor: i64) -> String {
    format!("{:.2}", minor_to_major(amount_minor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_to_major_is_exact() {
        assert_eq!(minor_to_major(10000), dec!(100.00));
        assert_eq!(minor_to_major(1), dec!(0.01));
        assert_eq!(minor_to_major(0), dec!(0.00));
        assert_eq!(minor_to_major(123_456_789), dec!(1234567.89));
    }

    #[test]
    fn minor_to_major_round_trips_without_drift() {
        for minor in [0_i64, 1, 99, 100, 10000, 999_999_999] {
            let major = minor_to_major(minor);
            let back = (major * dec!(100)).trunc();
            assert_eq!(back, Decimal::from(minor));
        }
    }

    #[test]
    fn format_major_renders_two_decimals() {
        assert_eq!(format_major(10000), "100.00");
        assert_eq!(format_major(5), "0.05");
        assert_eq!(format_major(0), "0.00");
    }
}
