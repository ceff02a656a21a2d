use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use cabshare_catalog::{
    CatalogError, InventoryError, RideCatalog, RideSnapshot, RideStatus, RideType, SeatInventory,
};

/// Ride catalog and seat inventory over Postgres. The compare-and-swap
/// contract is a single conditional UPDATE, so concurrent reservations
/// serialize on the row without any application-side locking.
pub struct PgRideStore {
    pool: PgPool,
}

impl PgRideStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RideRow {
    id: Uuid,
    driver_id: Uuid,
    seats_total: i32,
    seats_available: i32,
    price_per_seat_inr: i64,
    ride_type: String,
    allow_auto_confirm: bool,
    status: String,
}

impl RideRow {
    fn into_snapshot(self) -> Result<RideSnapshot, CatalogError> {
        let ride_type = RideType::parse(&self.ride_type)
            .ok_or_else(|| CatalogError::Storage(format!("unknown ride_type {}", self.ride_type)))?;
        let status = match self.status.as_str() {
            "published" => RideStatus::Published,
            "closed" => RideStatus::Closed,
            other => return Err(CatalogError::Storage(format!("unknown ride status {other}"))),
        };
        Ok(RideSnapshot {
            id: self.id,
            driver_id: self.driver_id,
            seats_total: self.seats_total as u32,
            seats_available: self.seats_available as u32,
            price_per_seat: self.price_per_seat_inr,
            ride_type,
            allow_auto_confirm: self.allow_auto_confirm,
            status,
        })
    }
}

#[async_trait]
impl RideCatalog for PgRideStore {
    async fn get_ride(&self, id: Uuid) -> Result<Option<RideSnapshot>, CatalogError> {
        let row = sqlx::query_as::<_, RideRow>(
            "SELECT id, driver_id, seats_total, seats_available, price_per_seat_inr, \
             ride_type, allow_auto_confirm, status FROM rides WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        row.map(RideRow::into_snapshot).transpose()
    }
}

#[async_trait]
impl SeatInventory for PgRideStore {
    async fn try_reserve_seats(&self, ride_id: Uuid, n: u32) -> Result<u32, InventoryError> {
        let new_available: Option<i32> = sqlx::query_scalar(
            "UPDATE rides SET seats_available = seats_available - $2, updated_at = NOW() \
             WHERE id = $1 AND seats_available >= $2 RETURNING seats_available",
        )
        .bind(ride_id)
        .bind(n as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InventoryError::Storage(e.to_string()))?;

        match new_available {
            Some(avail) => Ok(avail as u32),
            None => {
                // Guard failed; read the counter to build the right error
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT seats_available FROM rides WHERE id = $1")
                        .bind(ride_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| InventoryError::Storage(e.to_string()))?;
                match available {
                    Some(available) => Err(InventoryError::InsufficientSeats {
                        requested: n,
                        available: available as u32,
                    }),
                    None => Err(InventoryError::RideNotFound(ride_id)),
                }
            }
        }
    }

    async fn release_seats(&self, ride_id: Uuid, n: u32) -> Result<u32, InventoryError> {
        let new_available: Option<i32> = sqlx::query_scalar(
            "UPDATE rides SET seats_available = LEAST(seats_available + $2, seats_total), \
             updated_at = NOW() WHERE id = $1 RETURNING seats_available",
        )
        .bind(ride_id)
        .bind(n as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| InventoryError::Storage(e.to_string()))?;

        new_available
            .map(|a| a as u32)
            .ok_or(InventoryError::RideNotFound(ride_id))
    }
}
