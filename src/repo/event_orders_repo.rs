use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::order::{EventOrder, NewEventOrder, SaleTotals, TicketLine};
use crate::domain::payment::minor_to_major;
use crate::repo::outbox_repo::{OrderRecordedPayload, OutboxRepo, ORDER_RECORDED};

#[derive(Clone)]
pub struct EventOrdersRepo {
    pub pool: PgPool,
}

impl EventOrdersRepo {
    pub async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<EventOrder>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, event_id, event_slug, customer_name, customer_email, customer_phone,
                   tickets, total_amount, event_date, gateway_transaction_id, placed_at
            FROM event_orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    /// Conditional insert keyed on `order_id`. On first insertion the
    /// `order.recorded` outbox event joins the same transaction.
    pub async fn create_if_absent(
        &self,
        order: &NewEventOrder,
    ) -> anyhow::Result<(EventOrder, bool)> {
        let tickets: Vec<TicketLine> = order.lines.iter().map(TicketLine::from).collect();
        let totals = SaleTotals::from_lines(&order.lines);

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO event_orders (
                order_id, event_id, event_slug, customer_name, customer_email, customer_phone,
                tickets, total_amount, event_date, gateway_transaction_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.event_id)
        .bind(&order.event_slug)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(serde_json::to_value(&tickets)?)
        .bind(minor_to_major(totals.amount_minor))
        .bind(order.event_date)
        .bind(&order.gateway_transaction_id)
        .execute(tx.as_mut())
        .await?
        .rows_affected()
            == 1;

        if inserted {
            let payload = OrderRecordedPayload {
                order_id: order.order_id.clone(),
                event_id: order.event_id.clone(),
                lines: order.lines.clone(),
            };
            OutboxRepo::insert_tx(
                &mut tx,
                &order.order_id,
                ORDER_RECORDED,
                serde_json::to_value(payload)?,
            )
            .await?;
        }
        tx.commit().await?;

        let record = self
            .find_by_order_id(&order.order_id)
            .await?
            .context("order row missing after conditional insert")?;
        Ok((record, inserted))
    }
}

#[async_trait::async_trait]
impl crate::service::reconciler::EventOrderStore for EventOrdersRepo {
    async fn find_by_order_id(&self, order_id: &str) -> anyhow::Result<Option<EventOrder>> {
        EventOrdersRepo::find_by_order_id(self, order_id).await
    }

    async fn create_if_absent(
        &self,
        order: &NewEventOrder,
    ) -> anyhow::Result<(EventOrder, bool)> {
        EventOrdersRepo::create_if_absent(self, order).await
    }
}

fn row_to_order(r: PgRow) -> anyhow::Result<EventOrder> {
    let tickets_json: serde_json::Value = r.get("tickets");
    let tickets: Vec<TicketLine> =
        serde_json::from_value(tickets_json).context("malformed tickets column")?;

    Ok(EventOrder {
        order_id: r.get("order_id"),
        event_id: r.get("event_id"),
        event_slug: r.get("event_slug"),
        customer_name: r.get("customer_name"),
        customer_email: r.get("customer_email"),
        customer_phone: r.get("customer_phone"),
        tickets,
        total_amount: r.get("total_amount"),
        event_date: r.get("event_date"),
        gateway_transaction_id: r.get("gateway_transaction_id"),
        placed_at: r.get("placed_at"),
    })
}
