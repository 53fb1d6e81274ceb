use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::order::SaleLine;

pub const ORDER_RECORDED: &str = "order.recorded";

/// Payload of an `order.recorded` event: everything the rollup needs,
/// snapshotted at reconciliation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecordedPayload {
    pub order_id: String,
    pub event_id: String,
    pub lines: Vec<SaleLine>,
}

#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: i64,
    pub order_id: String,
    pub event_type: String,
    pub payload_json: serde_json::Value,
    pub attempts: i32,
}

#[derive(Clone)]
pub struct OutboxRepo {
    pub pool: PgPool,
}

impl OutboxRepo {
    /// Inserted in the same transaction as the order row; the unique
    /// (order_id, event_type) key keeps replays from enqueueing twice.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        order_id: &str,
        event_type: &str,
        payload_json: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_events_outbox (order_id, event_type, payload_json, status, attempts, next_attempt_at)
            VALUES ($1, $2, $3, 'PENDING', 0, now())
            ON CONFLICT (order_id, event_type) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(event_type)
        .bind(payload_json)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }

    pub async fn due_events(&self, batch_size: i64) -> Result<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, event_type, payload_json, attempts
            FROM order_events_outbox
            WHERE status = 'PENDING' AND next_attempt_at <= now()
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OutboxEvent {
                id: r.get("id"),
                order_id: r.get("order_id"),
                event_type: r.get("event_type"),
                payload_json: r.get("payload_json"),
                attempts: r.get("attempts"),
            })
            .collect())
    }

    /// Claims one pending event inside the caller's transaction. Returns
    /// false if another worker holds or already applied it.
    pub async fn lock_one_tx(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT id FROM order_events_outbox
            WHERE id = $1 AND status = 'PENDING'
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?;

        Ok(row.is_some())
    }

    /// Must run in the same transaction as the rollup increments.
    pub async fn mark_applied_tx(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE order_events_outbox SET status = 'APPLIED', applied_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn mark_retry(
        &self,
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE order_events_outbox SET status = 'PENDING', attempts = $2, next_attempt_at = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(attempts)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
