use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::payment::minor_to_major;

/// One sold ticket line as it travels through the gateway boundary.
/// Prices stay in minor units until the ledger write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub ticket_id: String,
    pub ticket_name: String,
    pub unit_price_minor: i64,
    pub quantity: i64,
}

impl SaleLine {
    pub fn amount_minor(&self) -> i64 {
        self.unit_price_minor * self.quantity
    }
}

/// Quantity and revenue contributed by one `record_sale` call. Computed once
/// and bound into a single atomic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub quantity: i64,
    pub amount_minor: i64,
}

impl SaleTotals {
    pub fn from_lines(lines: &[SaleLine]) -> Self {
        Self {
            quantity: lines.iter().map(|l| l.quantity).sum(),
            amount_minor: lines.iter().map(SaleLine::amount_minor).sum(),
        }
    }
}

/// Ticket line as stored on the order record, in major units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLine {
    pub id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
}

impl From<&SaleLine> for TicketLine {
    fn from(line: &SaleLine) -> Self {
        Self {
            id: line.ticket_id.clone(),
            name: line.ticket_name.clone(),
            unit_price: minor_to_major(line.unit_price_minor),
            quantity: line.quantity,
        }
    }
}

/// A ticket purchase for an event. `order_id` is the natural key.
#[derive(Debug, Clone, Serialize)]
pub struct EventOrder {
    pub order_id: String,
    pub event_id: String,
    pub event_slug: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub tickets: Vec<TicketLine>,
    pub total_amount: Decimal,
    pub event_date: Option<chrono::DateTime<chrono::Utc>>,
    pub gateway_transaction_id: Option<String>,
    pub placed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEventOrder {
    pub order_id: String,
    pub event_id: String,
    pub event_slug: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub lines: Vec<SaleLine>,
    pub event_date: Option<chrono::DateTime<chrono::Utc>>,
    pub gateway_transaction_id: Option<String>,
}

/// Per-event rollup counters. Mirrors the atomic increments the store issues;
/// also the response shape of the rollup read view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReservationStats {
    pub total_reservations: i64,
    pub total_sold: i64,
    pub sold_by_ticket_type: BTreeMap<String, i64>,
    pub revenue: Decimal,
}

impl ReservationStats {
    /// Applies one sale: one reservation, summed quantities and revenue,
    /// per-ticket counters.
    pub fn record_sale(&mut self, lines: &[SaleLine]) {
        let totals = SaleTotals::from_lines(lines);
        self.total_reservations += 1;
        self.total_sold += totals.quantity;
        self.revenue += minor_to_major(totals.amount_minor);
        for line in lines {
            *self
                .sold_by_ticket_type
                .entry(line.ticket_id.clone())
                .or_insert(0) += line.quantity;
        }
    }
}
