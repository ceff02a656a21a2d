use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cabshare_booking::{Booking, BookingStatus, BookingStore, StoreError};

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    rider_id: Uuid,
    seats: i32,
    fare_total_inr: i64,
    deposit_inr: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = BookingStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Storage(format!("unknown booking status {}", self.status)))?;
        Ok(Booking {
            id: self.id,
            ride_id: self.ride_id,
            rider_id: self.rider_id,
            seats: self.seats as u32,
            fare_total: self.fare_total_inr,
            deposit: self.deposit_inr,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

const COLUMNS: &str =
    "id, ride_id, rider_id, seats, fare_total_inr, deposit_inr, status, created_at, updated_at";

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bookings (id, ride_id, rider_id, seats, fare_total_inr, deposit_inr, \
             status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(booking.rider_id)
        .bind(booking.seats as i32)
        .bind(booking.fare_total)
        .bind(booking.deposit)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError> {
        // The status guard in the WHERE clause is the state machine's
        // concurrency control: the row moves exactly once per edge.
        let rows = sqlx::query(
            "UPDATE bookings SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .rows_affected();

        Ok(rows == 1)
    }

    async fn list_for_rider(&self, rider_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE rider_id = $1 ORDER BY created_at DESC"
        ))
        .bind(rider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}
