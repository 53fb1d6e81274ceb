use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::booking::{Booking, BookingStatus, NewBooking};
use crate::error::PaymentError;

#[derive(Clone)]
pub struct BookingsRepo {
    pub pool: PgPool,
}

impl BookingsRepo {
    pub async fn find_by_ref(&self, ref_number: &str) -> anyhow::Result<Option<Booking>> {
        let row = sqlx::query(
            r#"
            SELECT ref_number, name, email, phone, venue_tr, venue_en, start_time, end_time,
                   people, total_price, status, payment_id, notes
            FROM bookings
            WHERE ref_number = $1
            "#,
        )
        .bind(ref_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_booking).transpose()
    }

    /// Conditional insert keyed on `ref_number`. Concurrent callers racing on
    /// the same key all observe the single surviving row; the bool reports
    /// whether this call inserted it.
    pub async fn create_if_absent(&self, booking: &NewBooking) -> anyhow::Result<(Booking, bool)> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO bookings (
                ref_number, name, email, phone, venue_tr, venue_en, start_time, end_time,
                people, total_price, status, payment_id, notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (ref_number) DO NOTHING
            "#,
        )
        .bind(&booking.ref_number)
        .bind(&booking.name)
        .bind(&booking.email)
        .bind(&booking.phone)
        .bind(&booking.venue_tr)
        .bind(&booking.venue_en)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.people)
        .bind(booking.total_price)
        .bind(booking.status.as_str())
        .bind(&booking.payment_id)
        .bind(&booking.notes)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        let record = self
            .find_by_ref(&booking.ref_number)
            .await?
            .context("booking row missing after conditional insert")?;
        Ok((record, inserted))
    }

    /// Applies a status transition, rejecting any edge outside the allowed
    /// set. The UPDATE is guarded on the status the decision was made
    /// against, so a concurrent transition cannot be overwritten.
    pub async fn update_status(
        &self,
        ref_number: &str,
        new_status: BookingStatus,
    ) -> Result<Booking, PaymentError> {
        let current = self
            .find_by_ref(ref_number)
            .await
            .map_err(PaymentError::persistence)?
            .ok_or_else(|| PaymentError::NotFound(format!("booking {ref_number}")))?;

        if !current.status.can_transition_to(new_status) {
            return Err(PaymentError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        let rows = sqlx::query(
            "UPDATE bookings SET status = $2, updated_at = now() WHERE ref_number = $1 AND status = $3",
        )
        .bind(ref_number)
        .bind(new_status.as_str())
        .bind(current.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(PaymentError::persistence)?
        .rows_affected();

        if rows == 0 {
            // A concurrent transition moved the row first.
            return Err(PaymentError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        self.find_by_ref(ref_number)
            .await
            .map_err(PaymentError::persistence)?
            .ok_or_else(|| PaymentError::NotFound(format!("booking {ref_number}")))
    }
}

#[async_trait::async_trait]
impl crate::service::reconciler::BookingStore for BookingsRepo {
    async fn find_by_ref(&self, ref_number: &str) -> anyhow::Result<Option<Booking>> {
        BookingsRepo::find_by_ref(self, ref_number).await
    }

    async fn create_if_absent(&self, booking: &NewBooking) -> anyhow::Result<(Booking, bool)> {
        BookingsRepo::create_if_absent(self, booking).await
    }
}

fn row_to_booking(r: PgRow) -> anyhow::Result<Booking> {
    let status_raw: String = r.get("status");
    let status = BookingStatus::parse(&status_raw)
        .with_context(|| format!("unknown booking status {status_raw:?}"))?;

    Ok(Booking {
        ref_number: r.get("ref_number"),
        name: r.get("name"),
        email: r.get("email"),
        phone: r.get("phone"),
        venue_tr: r.get("venue_tr"),
        venue_en: r.get("venue_en"),
        start_time: r.get("start_time"),
        end_time: r.get("end_time"),
        people: r.get("people"),
        total_price: r.get("total_price"),
        status,
        payment_id: r.get("payment_id"),
        notes: r.get("notes"),
    })
}
