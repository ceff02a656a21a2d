use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::ride::{CatalogError, RideCatalog, RideSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Ride not found: {0}")]
    RideNotFound(Uuid),

    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("Inventory storage error: {0}")]
    Storage(String),
}

/// Per-ride seat counter. Implementations must make `try_reserve_seats` a
/// single atomic compare-and-swap: two concurrent callers whose combined
/// request exceeds availability can never both succeed. The inventory
/// knows nothing about money.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Decrement availability by `n`, returning the new count.
    async fn try_reserve_seats(&self, ride_id: Uuid, n: u32) -> Result<u32, InventoryError>;

    /// Increment availability by `n`, clamped at `seats_total`.
    /// Returns the new count. Safe to retry.
    async fn release_seats(&self, ride_id: Uuid, n: u32) -> Result<u32, InventoryError>;
}

/// In-memory ride catalog and seat inventory. One mutex guards the whole
/// table, so every reserve/release is trivially atomic; the Postgres
/// implementation gets the same guarantee from conditional UPDATEs.
#[derive(Default)]
pub struct MemoryInventory {
    rides: Mutex<HashMap<Uuid, RideSnapshot>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ride(&self, ride: RideSnapshot) {
        let mut rides = self.rides.lock().unwrap();
        rides.insert(ride.id, ride);
    }

    pub fn seats_available(&self, ride_id: Uuid) -> Option<u32> {
        let rides = self.rides.lock().unwrap();
        rides.get(&ride_id).map(|r| r.seats_available)
    }
}

#[async_trait]
impl RideCatalog for MemoryInventory {
    async fn get_ride(&self, id: Uuid) -> Result<Option<RideSnapshot>, CatalogError> {
        let rides = self.rides.lock().unwrap();
        Ok(rides.get(&id).cloned())
    }
}

#[async_trait]
impl SeatInventory for MemoryInventory {
    async fn try_reserve_seats(&self, ride_id: Uuid, n: u32) -> Result<u32, InventoryError> {
        let mut rides = self.rides.lock().unwrap();
        let ride = rides
            .get_mut(&ride_id)
            .ok_or(InventoryError::RideNotFound(ride_id))?;

        if n > ride.seats_available {
            return Err(InventoryError::InsufficientSeats {
                requested: n,
                available: ride.seats_available,
            });
        }

        ride.seats_available -= n;
        Ok(ride.seats_available)
    }

    async fn release_seats(&self, ride_id: Uuid, n: u32) -> Result<u32, InventoryError> {
        let mut rides = self.rides.lock().unwrap();
        let ride = rides
            .get_mut(&ride_id)
            .ok_or(InventoryError::RideNotFound(ride_id))?;

        ride.seats_available = (ride.seats_available + n).min(ride.seats_total);
        Ok(ride.seats_available)
    }
}
