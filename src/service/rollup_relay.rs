use anyhow::Result;
use chrono::{Duration, Utc};

use crate::repo::outbox_repo::{OrderRecordedPayload, OutboxEvent, OutboxRepo};
use crate::repo::rollups_repo::RollupsRepo;

/// Applies `order.recorded` outbox events to the per-event rollups. The
/// rollup increments and the applied-mark share one transaction; a sale is
/// never applied twice across relay or process restarts.
#[derive(Clone)]
pub struct RollupRelay {
    pub outbox_repo: OutboxRepo,
    pub rollups_repo: RollupsRepo,
}

impl RollupRelay {
    pub async fn run(self) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!("rollup relay error: {}", err);
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    async fn tick(&self) -> Result<()> {
        let batch = self.outbox_repo.due_events(100).await?;
        for item in batch {
            if let Err(e) = self.apply(&item).await {
                let attempts = item.attempts + 1;
                let backoff = i64::min(300, 2_i64.pow((attempts.min(8)) as u32));
                let next_attempt_at = Utc::now() + Duration::seconds(backoff);
                self.outbox_repo
                    .mark_retry(item.id, attempts, next_attempt_at)
                    .await?;
                tracing::warn!("rollup apply failed for outbox id {}: {}", item.id, e);
            }
        }

        Ok(())
    }

    async fn apply(&self, item: &OutboxEvent) -> Result<()> {
        let sale: OrderRecordedPayload = serde_json::from_value(item.payload_json.clone())?;

        let mut tx = self.outbox_repo.pool.begin().await?;
        if !OutboxRepo::lock_one_tx(&mut tx, item.id).await? {
            // Another worker claimed or already applied it.
            tx.rollback().await?;
            return Ok(());
        }
        RollupsRepo::apply_sale_tx(&mut tx, &sale).await?;
        OutboxRepo::mark_applied_tx(&mut tx, item.id).await?;
        tx.commit().await?;

        tracing::debug!(
            order_id = %sale.order_id,
            event_id = %sale.event_id,
            "sale applied to rollup"
        );
        Ok(())
    }
}
