use std::collections::BTreeMap;

use venue_ticketing::config::GvpConfig;
use venue_ticketing::domain::order::SaleLine;
use venue_ticketing::domain::payment::{
    BookingDetails, CustomerInfo, GatewayKind, OrderDetails, PaymentIntent, PurchaseKind,
};
use venue_ticketing::error::PaymentError;
use venue_ticketing::gateways::gvp::GvpGateway;
use venue_ticketing::gateways::{InitiateOutcome, PaymentGateway};
use venue_ticketing::hashcodec;

const STORE_KEY: &str = "TestStoreKey#2024";

#[tokio::test]
async fn initiation_form_carries_signed_hash_and_context() {
    let gateway = gateway();
    let outcome = gateway.initiate(&booking_intent("ORD-0001", 10000)).await.unwrap();

    let InitiateOutcome::Redirect(redirect) = outcome else {
        panic!("virtual POS initiation must yield a redirect form");
    };
    assert_eq!(redirect.action_url, gateway.config.gateway_url);

    let fields: BTreeMap<_, _> = redirect.fields.iter().cloned().collect();
    assert_eq!(fields.get("orderid").unwrap(), "ORD-0001");
    assert_eq!(fields.get("txnamount").unwrap(), "10000");
    assert_eq!(fields.get("txncurrencycode").unwrap(), "949");
    assert_eq!(fields.get("purchasekind").unwrap(), "BOOKING");
    assert_eq!(fields.get("venuetr").unwrap(), "Simülatör Salonu");

    let hashed_password = hashcodec::hashed_password(
        &gateway.config.provision_password,
        &gateway.config.terminal_id,
    );
    let expected = hashcodec::initiation_hash(&hashcodec::InitiationHashInput {
        terminal_id: &gateway.config.terminal_id,
        order_id: "ORD-0001",
        amount_minor: "10000",
        currency_code: "949",
        success_url: &gateway.success_url,
        error_url: &gateway.error_url,
        txn_type: "sales",
        installment_count: "",
        store_key: STORE_KEY,
        hashed_password: &hashed_password,
    });
    assert_eq!(fields.get("secure3dhash").unwrap(), &expected);
}

#[tokio::test]
async fn approved_callback_round_trips_the_purchase_context() {
    let gateway = gateway();
    let outcome = gateway.initiate(&booking_intent("ORD-0001", 10000)).await.unwrap();
    let InitiateOutcome::Redirect(redirect) = outcome else {
        panic!("expected redirect");
    };

    // Simulate the gateway: echo the form, add the outcome fields, sign.
    let callback = gateway.parse_callback(approved_callback_from(redirect.fields));
    let result = gateway.verified_result(&callback).unwrap();

    assert!(result.success);
    assert_eq!(result.order_id, "ORD-0001");
    assert_eq!(result.amount_minor, 10000);
    assert_eq!(result.gateway_transaction_id.as_deref(), Some("TX123456"));
    assert_eq!(result.error_code, None);

    let customer = gateway.customer_from_callback(&callback);
    assert_eq!(customer.email, "driver@example.com");

    match gateway.purchase_from_callback(&callback).unwrap() {
        PurchaseKind::Booking(details) => {
            assert_eq!(details.venue_en, "Simulator Hall");
            assert_eq!(details.people, 2);
        }
        PurchaseKind::Tickets(_) => panic!("expected a booking purchase"),
    }
}

#[tokio::test]
async fn tampered_amount_is_rejected_before_any_field_is_read() {
    let gateway = gateway();
    let outcome = gateway.initiate(&booking_intent("ORD-0001", 10000)).await.unwrap();
    let InitiateOutcome::Redirect(redirect) = outcome else {
        panic!("expected redirect");
    };

    let mut fields = approved_callback_from(redirect.fields);
    // Inflate the charged amount after signing.
    fields.insert("txnamount".to_string(), "1".to_string());

    let callback = gateway.parse_callback(fields);
    assert!(matches!(
        gateway.verified_result(&callback),
        Err(PaymentError::Integrity)
    ));
}

#[tokio::test]
async fn declined_callback_surfaces_gateway_error() {
    let gateway = gateway();
    let mut fields = BTreeMap::new();
    fields.insert("clientid".to_string(), gateway.config.terminal_id.clone());
    fields.insert("orderid".to_string(), "ORD-0002".to_string());
    fields.insert("txnamount".to_string(), "5000".to_string());
    fields.insert("procreturncode".to_string(), "99".to_string());
    fields.insert("errmsg".to_string(), "Genel Hata".to_string());
    sign_callback(&mut fields);

    let callback = gateway.parse_callback(fields);
    let result = gateway.verified_result(&callback).unwrap();

    assert!(!result.success);
    assert_eq!(result.error_code.as_deref(), Some("99"));
    assert_eq!(result.error_message.as_deref(), Some("Genel Hata"));
}

#[tokio::test]
async fn ticket_context_round_trips_through_the_form() {
    let gateway = gateway();
    let intent = PaymentIntent {
        order_id: "ORD-0003".to_string(),
        amount_minor: 25000,
        currency: "TRY".to_string(),
        customer: customer(),
        purchase: PurchaseKind::Tickets(OrderDetails {
            event_id: "evt-1".to_string(),
            event_slug: "track-day".to_string(),
            event_date: None,
            lines: vec![
                SaleLine {
                    ticket_id: "std".to_string(),
                    ticket_name: "Standard".to_string(),
                    unit_price_minor: 5000,
                    quantity: 2,
                },
                SaleLine {
                    ticket_id: "vip".to_string(),
                    ticket_name: "VIP".to_string(),
                    unit_price_minor: 15000,
                    quantity: 1,
                },
            ],
        }),
        gateway_kind: GatewayKind::VirtualPos,
    };

    let InitiateOutcome::Redirect(redirect) = gateway.initiate(&intent).await.unwrap() else {
        panic!("expected redirect");
    };
    let callback = gateway.parse_callback(approved_callback_from(redirect.fields));
    gateway.verified_result(&callback).unwrap();

    match gateway.purchase_from_callback(&callback).unwrap() {
        PurchaseKind::Tickets(details) => {
            assert_eq!(details.event_id, "evt-1");
            assert_eq!(details.lines.len(), 2);
            assert_eq!(details.lines[1].unit_price_minor, 15000);
        }
        PurchaseKind::Booking(_) => panic!("expected a ticket purchase"),
    }
}

fn gateway() -> GvpGateway {
    GvpGateway {
        config: GvpConfig {
            gateway_url: "https://pos.example.com/servlet/gt3dengine".to_string(),
            terminal_id: "30691297".to_string(),
            provision_password: "ProvTest123".to_string(),
            store_key: STORE_KEY.to_string(),
        },
        success_url: "https://tickets.example.com/payment/callback-success".to_string(),
        error_url: "https://tickets.example.com/payment/callback-error".to_string(),
    }
}

fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Ada Driver".to_string(),
        email: "driver@example.com".to_string(),
        phone: Some("+905551112233".to_string()),
    }
}

fn booking_intent(order_id: &str, amount_minor: i64) -> PaymentIntent {
    PaymentIntent {
        order_id: order_id.to_string(),
        amount_minor,
        currency: "TRY".to_string(),
        customer: customer(),
        purchase: PurchaseKind::Booking(BookingDetails {
            venue_tr: "Simülatör Salonu".to_string(),
            venue_en: "Simulator Hall".to_string(),
            start_time: "2026-09-01T10:00:00Z".parse().unwrap(),
            end_time: "2026-09-01T11:00:00Z".parse().unwrap(),
            people: 2,
            notes: None,
        }),
        gateway_kind: GatewayKind::VirtualPos,
    }
}

/// Plays the gateway's part: take the initiation form, append the approval
/// outcome, and sign everything with the shared store key.
fn approved_callback_from(form_fields: Vec<(String, String)>) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = form_fields
        .into_iter()
        .filter(|(name, _)| name != "secure3dhash")
        .collect();
    fields.insert("procreturncode".to_string(), "00".to_string());
    fields.insert("transid".to_string(), "TX123456".to_string());
    sign_callback(&mut fields);
    fields
}

fn sign_callback(fields: &mut BTreeMap<String, String>) {
    use sha2::{Digest, Sha512};

    let names: Vec<String> = fields.keys().cloned().collect();
    let mut hasher = Sha512::new();
    for name in &names {
        hasher.update(fields[name].as_bytes());
    }
    hasher.update(STORE_KEY.as_bytes());

    fields.insert("hashparams".to_string(), names.join(":"));
    fields.insert("hash".to_string(), hex::encode_upper(hasher.finalize()));
}
