use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::order::{ReservationStats, SaleTotals, TicketLine};
use crate::domain::payment::minor_to_major;
use crate::repo::outbox_repo::OrderRecordedPayload;

#[derive(Clone)]
pub struct RollupsRepo {
    pub pool: PgPool,
}

/// Read view of one event's rollup: catalog snapshot, sold lines, counters.
#[derive(Debug, Serialize)]
pub struct EventRollupView {
    pub event_id: String,
    pub tickets: Vec<TicketLine>,
    pub sold_tickets: Vec<SoldLine>,
    pub reservation_stats: ReservationStats,
}

#[derive(Debug, Serialize)]
pub struct SoldLine {
    pub order_id: String,
    pub ticket_id: String,
    pub ticket_name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
    pub amount: Decimal,
    pub sold_at: chrono::DateTime<chrono::Utc>,
}

impl RollupsRepo {
    /// Applies one recorded sale inside the caller's transaction: lazy rollup
    /// creation with the catalog snapshot, then counter increments and line
    /// appends expressed as atomic SQL updates. Nothing here reads a counter
    /// back into application code.
    pub async fn apply_sale_tx(
        tx: &mut Transaction<'_, Postgres>,
        sale: &OrderRecordedPayload,
    ) -> Result<()> {
        let catalog: Vec<TicketLine> = sale.lines.iter().map(TicketLine::from).collect();
        sqlx::query(
            r#"
            INSERT INTO event_rollups (event_id, tickets)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&sale.event_id)
        .bind(serde_json::to_value(&catalog)?)
        .execute(tx.as_mut())
        .await?;

        let totals = SaleTotals::from_lines(&sale.lines);
        sqlx::query(
            r#"
            UPDATE event_rollups
            SET total_reservations = total_reservations + 1,
                total_sold = total_sold + $2,
                revenue = revenue + $3,
                updated_at = now()
            WHERE event_id = $1
            "#,
        )
        .bind(&sale.event_id)
        .bind(totals.quantity)
        .bind(minor_to_major(totals.amount_minor))
        .execute(tx.as_mut())
        .await?;

        for line in &sale.lines {
            sqlx::query(
                r#"
                INSERT INTO rollup_ticket_counts (event_id, ticket_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (event_id, ticket_id)
                DO UPDATE SET quantity = rollup_ticket_counts.quantity + EXCLUDED.quantity
                "#,
            )
            .bind(&sale.event_id)
            .bind(&line.ticket_id)
            .bind(line.quantity)
            .execute(tx.as_mut())
            .await?;

            sqlx::query(
                r#"
                INSERT INTO rollup_sold_lines (event_id, order_id, ticket_id, ticket_name, unit_price, quantity, amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&sale.event_id)
            .bind(&sale.order_id)
            .bind(&line.ticket_id)
            .bind(&line.ticket_name)
            .bind(minor_to_major(line.unit_price_minor))
            .bind(line.quantity)
            .bind(minor_to_major(line.amount_minor()))
            .execute(tx.as_mut())
            .await?;
        }

        Ok(())
    }

    pub async fn get(&self, event_id: &str) -> Result<Option<EventRollupView>> {
        let rollup = sqlx::query(
            r#"
            SELECT event_id, tickets, total_reservations, total_sold, revenue
            FROM event_rollups
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(rollup) = rollup else {
            return Ok(None);
        };

        let tickets: Vec<TicketLine> = serde_json::from_value(rollup.get("tickets"))?;

        let mut stats = ReservationStats {
            total_reservations: rollup.get("total_reservations"),
            total_sold: rollup.get("total_sold"),
            revenue: rollup.get("revenue"),
            ..Default::default()
        };

        let counts = sqlx::query(
            "SELECT ticket_id, quantity FROM rollup_ticket_counts WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        for row in counts {
            stats
                .sold_by_ticket_type
                .insert(row.get("ticket_id"), row.get("quantity"));
        }

        let lines = sqlx::query(
            r#"
            SELECT order_id, ticket_id, ticket_name, unit_price, quantity, amount, sold_at
            FROM rollup_sold_lines
            WHERE event_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let sold_tickets = lines
            .into_iter()
            .map(|r| SoldLine {
                order_id: r.get("order_id"),
                ticket_id: r.get("ticket_id"),
                ticket_name: r.get("ticket_name"),
                unit_price: r.get("unit_price"),
                quantity: i64::from(r.get::<i32, _>("quantity")),
                amount: r.get("amount"),
                sold_at: r.get("sold_at"),
            })
            .collect();

        Ok(Some(EventRollupView {
            event_id: rollup.get("event_id"),
            tickets,
            sold_tickets,
            reservation_stats: stats,
        }))
    }
}
