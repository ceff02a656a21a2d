use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Booking storage error: {0}")]
    Storage(String),
}

/// Durable booking records. `transition` is the concurrency guard for the
/// state machine: it succeeds only while the stored status still equals
/// `from`, so two actors racing on the same booking resolve to exactly one
/// winner.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Guarded status update. Returns false when the stored status no
    /// longer matches `from` (the caller lost a race).
    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError>;

    async fn list_for_rider(&self, rider_id: Uuid) -> Result<Vec<Booking>, StoreError>;
}

/// In-memory booking store for tests.
#[derive(Default)]
pub struct MemoryBookingStore {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.lock().unwrap();
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let bookings = self.bookings.lock().unwrap();
        Ok(bookings.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError> {
        let mut bookings = self.bookings.lock().unwrap();
        match bookings.get_mut(&id) {
            Some(b) if b.status == from => {
                b.status = to;
                b.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_rider(&self, rider_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.lock().unwrap();
        let mut out: Vec<Booking> = bookings
            .values()
            .filter(|b| b.rider_id == rider_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
