use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rust_decimal_macros::dec;

use venue_ticketing::domain::booking::{Booking, BookingStatus, NewBooking, FREE_PAYMENT_PREFIX};
use venue_ticketing::domain::order::{EventOrder, NewEventOrder, SaleLine, SaleTotals, TicketLine};
use venue_ticketing::domain::payment::{
    minor_to_major, BookingDetails, CustomerInfo, OrderDetails, VerifiedPaymentResult,
};
use venue_ticketing::service::reconciler::{
    BookingStore, EventOrderStore, OrderReconciler, Reconciliation,
};

/// In-memory ledger with the same conditional-insert contract as the
/// Postgres repo: one row per natural key, first writer wins.
#[derive(Default)]
struct MemBookings {
    rows: Mutex<HashMap<String, Booking>>,
}

#[async_trait::async_trait]
impl BookingStore for MemBookings {
    async fn find_by_ref(&self, ref_number: &str) -> anyhow::Result<Option<Booking>> {
        Ok(self.rows.lock().unwrap().get(ref_number).cloned())
    }

    async fn create_if_absent(&self, booking: &NewBooking) -> anyhow::Result<(Booking, bool)> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get(&booking.ref_number) {
            return Ok((existing.clone(), false));
        }
        let record = Booking {
            ref_number: booking.ref_number.clone(),
            name: booking.name.clone(),
            email: booking.email.clone(),
            phone: booking.phone.clone(),
            venue_tr: booking.venue_tr.clone(),
            venue_en: booking.venue_en.clone(),
            start_time: booking.start_time,
            end_time: booking.end_time,
            people: booking.people,
            total_price: booking.total_price,
            status: booking.status,
            payment_id: booking.payment_id.clone(),
            notes: booking.notes.clone(),
        };
        rows.insert(booking.ref_number.clone(), record.clone());
        Ok((record, true))
    }
}

#[derive(Default)]
struct MemOrders {
    rows: Mutex<HashMap<String, EventOrder>>,
}

#[async_trait::async_trait]
impl EventOrderStore for MemOrders {
    async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<EventOrder>> {
        Ok(self.rows.lock().unwrap().get(order_id).cloned())
    }

    async fn create_if_absent(
        &self,
        order: &NewEventOrder,
    ) -> anyhow::Result<(EventOrder, bool)> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get(&order.order_id) {
            return Ok((existing.clone(), false));
        }
        let totals = SaleTotals::from_lines(&order.lines);
        let record = EventOrder {
            order_id: order.order_id.clone(),
            event_id: order.event_id.clone(),
            event_slug: order.event_slug.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            tickets: order.lines.iter().map(TicketLine::from).collect(),
            total_amount: minor_to_major(totals.amount_minor),
            event_date: order.event_date,
            gateway_transaction_id: order.gateway_transaction_id.clone(),
            placed_at: chrono::Utc::now(),
        };
        rows.insert(order.order_id.clone(), record.clone());
        Ok((record, true))
    }
}

fn reconciler() -> (OrderReconciler, Arc<MemBookings>, Arc<MemOrders>) {
    let bookings = Arc::new(MemBookings::default());
    let orders = Arc::new(MemOrders::default());
    (
        OrderReconciler::new(bookings.clone(), orders.clone()),
        bookings,
        orders,
    )
}

fn approved(order_id: &str, amount_minor: i64) -> VerifiedPaymentResult {
    VerifiedPaymentResult {
        order_id: order_id.to_string(),
        amount_minor,
        success: true,
        error_code: None,
        error_message: None,
        gateway_transaction_id: Some("TX123456".to_string()),
    }
}

fn declined(order_id: &str) -> VerifiedPaymentResult {
    VerifiedPaymentResult {
        order_id: order_id.to_string(),
        amount_minor: 10000,
        success: false,
        error_code: Some("99".to_string()),
        error_message: Some("declined".to_string()),
        gateway_transaction_id: None,
    }
}

fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Ada Driver".to_string(),
        email: "driver@example.com".to_string(),
        phone: None,
    }
}

fn slot() -> BookingDetails {
    BookingDetails {
        venue_tr: "Simülatör Salonu".to_string(),
        venue_en: "Simulator Hall".to_string(),
        start_time: "2026-09-01T10:00:00Z".parse().unwrap(),
        end_time: "2026-09-01T11:00:00Z".parse().unwrap(),
        people: 2,
        notes: None,
    }
}

fn order_details() -> OrderDetails {
    OrderDetails {
        event_id: "evt-1".to_string(),
        event_slug: "track-day".to_string(),
        event_date: None,
        lines: vec![SaleLine {
            ticket_id: "std".to_string(),
            ticket_name: "Standard".to_string(),
            unit_price_minor: 5000,
            quantity: 2,
        }],
    }
}

#[tokio::test]
async fn approved_booking_is_recorded_confirmed_in_major_units() {
    let (reconciler, bookings, _) = reconciler();

    let outcome = reconciler
        .reconcile_booking(&approved("ORD1", 10000), &customer(), &slot())
        .await
        .unwrap();

    let Reconciliation::Recorded(record) = outcome else {
        panic!("first delivery must create the record");
    };
    assert_eq!(record.status, BookingStatus::Confirmed);
    assert_eq!(record.total_price, dec!(100.00));
    assert_eq!(record.payment_id, "TX123456");
    assert_eq!(bookings.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn replayed_callback_returns_the_first_record_unchanged() {
    let (reconciler, bookings, _) = reconciler();
    let result = approved("ORD1", 10000);

    let first = reconciler
        .reconcile_booking(&result, &customer(), &slot())
        .await
        .unwrap();
    let first_record = first.record().unwrap().clone();

    for _ in 0..5 {
        let replay = reconciler
            .reconcile_booking(&result, &customer(), &slot())
            .await
            .unwrap();
        match replay {
            Reconciliation::AlreadyRecorded(record) => {
                assert_eq!(record.ref_number, first_record.ref_number);
                assert_eq!(record.total_price, first_record.total_price);
                assert_eq!(record.payment_id, first_record.payment_id);
            }
            other => panic!("replay must be absorbed, got {other:?}"),
        }
    }

    assert_eq!(bookings.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_reconciliations_on_one_key_create_exactly_one_record() {
    let (reconciler, bookings, _) = reconciler();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let reconciler = reconciler.clone();
        handles.push(tokio::spawn(async move {
            reconciler
                .reconcile_booking(&approved("ORD1", 10000), &customer(), &slot())
                .await
                .unwrap()
        }));
    }

    let mut created = 0;
    for handle in handles {
        if let Reconciliation::Recorded(_) = handle.await.unwrap() {
            created += 1;
        }
    }

    assert_eq!(created, 1, "exactly one attempt may insert");
    assert_eq!(bookings.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn declined_callback_persists_nothing() {
    let (reconciler, bookings, orders) = reconciler();

    let outcome = reconciler
        .reconcile_booking(&declined("ORD2"), &customer(), &slot())
        .await
        .unwrap();
    match outcome {
        Reconciliation::Declined { code, message } => {
            assert_eq!(code.as_deref(), Some("99"));
            assert_eq!(message.as_deref(), Some("declined"));
        }
        other => panic!("decline must not persist, got {other:?}"),
    }

    let outcome = reconciler
        .reconcile_order(&declined("ORD3"), &customer(), &order_details())
        .await
        .unwrap();
    assert!(matches!(outcome, Reconciliation::Declined { .. }));

    assert!(bookings.rows.lock().unwrap().is_empty());
    assert!(orders.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn decline_after_recorded_success_still_returns_the_record() {
    let (reconciler, _, orders) = reconciler();

    reconciler
        .reconcile_order(&approved("ORD4", 10000), &customer(), &order_details())
        .await
        .unwrap();

    // A late duplicate delivery that claims failure must not disturb the
    // recorded order.
    let outcome = reconciler
        .reconcile_order(&declined("ORD4"), &customer(), &order_details())
        .await
        .unwrap();
    assert!(matches!(outcome, Reconciliation::AlreadyRecorded(_)));
    assert_eq!(orders.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn free_booking_is_confirmed_with_marker_and_zero_price() {
    let (reconciler, bookings, _) = reconciler();

    let record = reconciler
        .record_free_booking(&customer(), &slot())
        .await
        .unwrap();

    assert_eq!(record.status, BookingStatus::Confirmed);
    assert_eq!(record.total_price, dec!(0));
    assert!(record.payment_id.starts_with(FREE_PAYMENT_PREFIX));
    assert!(!record.ref_number.is_empty());
    assert_eq!(bookings.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn order_total_is_derived_from_lines_exactly() {
    let (reconciler, _, orders) = reconciler();

    reconciler
        .reconcile_order(&approved("ORD5", 10000), &customer(), &order_details())
        .await
        .unwrap();

    let stored = orders.rows.lock().unwrap().get("ORD5").cloned().unwrap();
    assert_eq!(stored.total_amount, dec!(100.00));
    assert_eq!(stored.tickets[0].unit_price, dec!(50.00));
}
