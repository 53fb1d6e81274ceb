use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingStatus, NewBooking, FREE_PAYMENT_PREFIX};
use crate::domain::order::{EventOrder, NewEventOrder};
use crate::domain::payment::{
    minor_to_major, BookingDetails, CustomerInfo, OrderDetails, VerifiedPaymentResult,
};
use crate::error::PaymentError;

/// Ledger seam for bookings. The production implementation is the Postgres
/// repo; the conditional-insert contract is what makes reconciliation
/// idempotent under races.
#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_by_ref(&self, ref_number: &str) -> anyhow::Result<Option<Booking>>;
    async fn create_if_absent(&self, booking: &NewBooking) -> anyhow::Result<(Booking, bool)>;
}

/// Ledger seam for event orders.
#[async_trait::async_trait]
pub trait EventOrderStore: Send + Sync {
    async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<EventOrder>>;
    async fn create_if_absent(&self, order: &NewEventOrder) -> anyhow::Result<(EventOrder, bool)>;
}

/// Outcome of reconciling one verified callback.
#[derive(Debug)]
pub enum Reconciliation<T> {
    /// First delivery: a record was persisted.
    Recorded(T),
    /// Duplicate delivery or lost race: the existing record, untouched.
    AlreadyRecorded(T),
    /// Gateway declined and no record exists; nothing was persisted.
    Declined {
        code: Option<String>,
        message: Option<String>,
    },
}

impl<T> Reconciliation<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Reconciliation::Recorded(r) | Reconciliation::AlreadyRecorded(r) => Some(r),
            Reconciliation::Declined { .. } => None,
        }
    }
}

/// Turns verified payment results into at-most-one durable record per
/// natural key. Duplicate callbacks and user retries resolve to the record
/// written by the first successful attempt.
#[derive(Clone)]
pub struct OrderReconciler {
    bookings: Arc<dyn BookingStore>,
    orders: Arc<dyn EventOrderStore>,
}

impl OrderReconciler {
    pub fn new(bookings: Arc<dyn BookingStore>, orders: Arc<dyn EventOrderStore>) -> Self {
        Self { bookings, orders }
    }

    pub async fn reconcile_booking(
        &self,
        result: &VerifiedPaymentResult,
        customer: &CustomerInfo,
        details: &BookingDetails,
    ) -> Result<Reconciliation<Booking>, PaymentError> {
        if let Some(existing) = self
            .bookings
            .find_by_ref(&result.order_id)
            .await
            .map_err(PaymentError::persistence)?
        {
            tracing::info!(ref_number = %result.order_id, "duplicate booking callback absorbed");
            return Ok(Reconciliation::AlreadyRecorded(existing));
        }

        if !result.success {
            return Ok(Reconciliation::Declined {
                code: result.error_code.clone(),
                message: result.error_message.clone(),
            });
        }

        let booking = NewBooking {
            ref_number: result.order_id.clone(),
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            venue_tr: details.venue_tr.clone(),
            venue_en: details.venue_en.clone(),
            start_time: details.start_time,
            end_time: details.end_time,
            people: details.people,
            total_price: minor_to_major(result.amount_minor),
            status: BookingStatus::Confirmed,
            payment_id: result
                .gateway_transaction_id
                .clone()
                .unwrap_or_else(|| result.order_id.clone()),
            notes: details.notes.clone(),
        };

        let (record, created) = self
            .bookings
            .create_if_absent(&booking)
            .await
            .map_err(PaymentError::persistence)?;
        Ok(if created {
            Reconciliation::Recorded(record)
        } else {
            Reconciliation::AlreadyRecorded(record)
        })
    }

    pub async fn reconcile_order(
        &self,
        result: &VerifiedPaymentResult,
        customer: &CustomerInfo,
        details: &OrderDetails,
    ) -> Result<Reconciliation<EventOrder>, PaymentError> {
        if let Some(existing) = self
            .orders
            .find_by_order_id(&result.order_id)
            .await
            .map_err(PaymentError::persistence)?
        {
            tracing::info!(order_id = %result.order_id, "duplicate order callback absorbed");
            return Ok(Reconciliation::AlreadyRecorded(existing));
        }

        if !result.success {
            return Ok(Reconciliation::Declined {
                code: result.error_code.clone(),
                message: result.error_message.clone(),
            });
        }

        let order = NewEventOrder {
            order_id: result.order_id.clone(),
            event_id: details.event_id.clone(),
            event_slug: details.event_slug.clone(),
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            customer_phone: customer.phone.clone(),
            lines: details.lines.clone(),
            event_date: details.event_date,
            gateway_transaction_id: result.gateway_transaction_id.clone(),
        };

        let (record, created) = self
            .orders
            .create_if_absent(&order)
            .await
            .map_err(PaymentError::persistence)?;
        Ok(if created {
            Reconciliation::Recorded(record)
        } else {
            Reconciliation::AlreadyRecorded(record)
        })
    }

    /// Zero-price venue bookings skip the gateway entirely: confirmed on the
    /// spot with a locally generated ref and a `FREE-` payment marker.
    pub async fn record_free_booking(
        &self,
        customer: &CustomerInfo,
        details: &BookingDetails,
    ) -> Result<Booking, PaymentError> {
        let booking = NewBooking {
            ref_number: format!("BK-{}", Uuid::new_v4().simple()),
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            venue_tr: details.venue_tr.clone(),
            venue_en: details.venue_en.clone(),
            start_time: details.start_time,
            end_time: details.end_time,
            people: details.people,
            total_price: Decimal::ZERO,
            status: BookingStatus::Confirmed,
            payment_id: format!("{}{}", FREE_PAYMENT_PREFIX, Uuid::new_v4().simple()),
            notes: details.notes.clone(),
        };

        let (record, _) = self
            .bookings
            .create_if_absent(&booking)
            .await
            .map_err(PaymentError::persistence)?;
        Ok(record)
    }
}
