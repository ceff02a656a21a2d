use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use cabshare_catalog::{
    CatalogError, InventoryError, RideCatalog, RideStatus, SeatInventory,
};
use cabshare_core::Money;
use cabshare_ledger::{LedgerError, LedgerStore};

use crate::deposit::deposit_for;
use crate::models::{Booking, BookingStatus};
use crate::store::{BookingStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Ride not found")]
    RideNotFound,

    #[error("Ride is not open for booking")]
    RideNotPublished,

    #[error("Drivers cannot book their own ride")]
    SelfBookingForbidden,

    #[error("Seat count must be at least 1")]
    InvalidSeatCount,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Only the ride's driver may do this")]
    NotRideDriver,

    #[error("Only the rider or the driver may cancel")]
    NotBookingParty,

    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("Insufficient wallet balance: deposit {required} required, {available} available")]
    InsufficientFunds { required: Money, available: Money },

    #[error("Invalid booking transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Compensation failed, booking needs operator attention: {0}")]
    CompensationFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<CatalogError> for BookingError {
    fn from(err: CatalogError) -> Self {
        BookingError::Storage(err.to_string())
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::Storage(err.to_string())
    }
}

impl From<InventoryError> for BookingError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::RideNotFound(_) => BookingError::RideNotFound,
            InventoryError::InsufficientSeats {
                requested,
                available,
            } => BookingError::InsufficientSeats {
                requested,
                available,
            },
            InventoryError::Storage(msg) => BookingError::Storage(msg),
        }
    }
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => BookingError::InsufficientFunds {
                required,
                available,
            },
            other => BookingError::Storage(other.to_string()),
        }
    }
}

/// Compensation retry policy. Overridable from app config.
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    pub compensation_attempts: u32,
    pub compensation_backoff_ms: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            compensation_attempts: 3,
            compensation_backoff_ms: 50,
        }
    }
}

/// Coordinates the seat inventory, the ledger and the booking store so
/// that create/approve/reject/cancel behave as single logical operations.
///
/// The inventory and the ledger are separate resources with no shared
/// transaction, so multi-step flows run saga-style: each step is an
/// independently atomic primitive, and a failure after the first effect
/// triggers explicit compensation. No lock is held across steps; any
/// number of these calls may run in parallel.
pub struct EscrowOrchestrator {
    catalog: Arc<dyn RideCatalog>,
    inventory: Arc<dyn SeatInventory>,
    ledger: Arc<dyn LedgerStore>,
    bookings: Arc<dyn BookingStore>,
    config: EscrowConfig,
}

impl EscrowOrchestrator {
    pub fn new(
        catalog: Arc<dyn RideCatalog>,
        inventory: Arc<dyn SeatInventory>,
        ledger: Arc<dyn LedgerStore>,
        bookings: Arc<dyn BookingStore>,
        config: EscrowConfig,
    ) -> Self {
        Self {
            catalog,
            inventory,
            ledger,
            bookings,
            config,
        }
    }

    /// Reserve the deposit, then (for auto-confirm rides) the seats, then
    /// persist the booking. Every failure after the deposit reservation
    /// compensates before returning; a reservation is never left orphaned.
    pub async fn create_booking(
        &self,
        ride_id: Uuid,
        rider_id: Uuid,
        seats: u32,
    ) -> Result<Booking, BookingError> {
        if seats == 0 {
            return Err(BookingError::InvalidSeatCount);
        }

        let ride = self
            .catalog
            .get_ride(ride_id)
            .await?
            .ok_or(BookingError::RideNotFound)?;
        if ride.status != RideStatus::Published {
            return Err(BookingError::RideNotPublished);
        }
        if ride.driver_id == rider_id {
            return Err(BookingError::SelfBookingForbidden);
        }
        // Advisory pre-check; the CAS below is the authority
        if seats > ride.seats_available {
            return Err(BookingError::InsufficientSeats {
                requested: seats,
                available: ride.seats_available,
            });
        }

        let fare_total = ride.fare_for(seats);
        let deposit = deposit_for(ride.ride_type, fare_total);
        let booking_id = Uuid::new_v4();

        // First effect. InsufficientFunds aborts with nothing to unwind.
        self.ledger.reserve(rider_id, deposit, Some(booking_id)).await?;

        let mut seats_taken = false;
        let status = if ride.allow_auto_confirm {
            match self.inventory.try_reserve_seats(ride_id, seats).await {
                Ok(_) => {
                    seats_taken = true;
                    BookingStatus::Confirmed
                }
                Err(err) => {
                    // Lost the seat race (or the counter errored): give the
                    // deposit back before surfacing the failure.
                    self.unwind_create(ride_id, rider_id, seats, deposit, booking_id, false)
                        .await?;
                    return Err(err.into());
                }
            }
        } else {
            // A pending request holds funds, never inventory
            BookingStatus::Requested
        };

        let booking = Booking::new(
            booking_id, ride_id, rider_id, seats, fare_total, deposit, status,
        );
        if let Err(err) = self.bookings.insert(&booking).await {
            self.unwind_create(ride_id, rider_id, seats, deposit, booking_id, seats_taken)
                .await?;
            return Err(err.into());
        }

        tracing::info!(
            booking_id = %booking.id,
            ride_id = %ride_id,
            rider_id = %rider_id,
            seats,
            deposit,
            status = %booking.status,
            "booking created"
        );
        Ok(booking)
    }

    /// Driver approval of a pending request. Seats are taken first; if the
    /// ride filled up in the meantime the booking simply stays `Requested`.
    pub async fn approve(&self, booking_id: Uuid, driver_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;
        let ride = self
            .catalog
            .get_ride(booking.ride_id)
            .await?
            .ok_or(BookingError::RideNotFound)?;
        if ride.driver_id != driver_id {
            return Err(BookingError::NotRideDriver);
        }
        if booking.status != BookingStatus::Requested {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Confirmed,
            });
        }

        self.inventory
            .try_reserve_seats(booking.ride_id, booking.seats)
            .await?;

        // Seats are held from here on; every exit below must give them
        // back or escalate.
        let won = match self
            .bookings
            .transition(booking_id, BookingStatus::Requested, BookingStatus::Confirmed)
            .await
        {
            Ok(won) => won,
            Err(err) => {
                if !self.release_seats_with_retry(booking.ride_id, booking.seats).await {
                    return Err(self.escalate(booking_id, "seat release after failed approve write"));
                }
                return Err(err.into());
            }
        };
        if !won {
            // A concurrent cancel got there first; the seats go back.
            if !self.release_seats_with_retry(booking.ride_id, booking.seats).await {
                return Err(self.escalate(booking_id, "seat release after lost approve race"));
            }
            return Err(BookingError::InvalidTransition {
                from: BookingStatus::Requested,
                to: BookingStatus::Confirmed,
            });
        }

        tracing::info!(booking_id = %booking_id, "booking approved");
        self.reload(booking_id).await
    }

    /// Driver rejection of a pending request: deposit returned, no seat
    /// unwind because a request never held inventory.
    pub async fn reject(&self, booking_id: Uuid, driver_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;
        let ride = self
            .catalog
            .get_ride(booking.ride_id)
            .await?
            .ok_or(BookingError::RideNotFound)?;
        if ride.driver_id != driver_id {
            return Err(BookingError::NotRideDriver);
        }

        let won = self
            .bookings
            .transition(booking_id, BookingStatus::Requested, BookingStatus::Rejected)
            .await?;
        if !won {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Rejected,
            });
        }

        if !self
            .release_deposit_with_retry(booking.rider_id, booking.deposit, booking_id)
            .await
        {
            let _ = self
                .bookings
                .transition(booking_id, BookingStatus::Rejected, BookingStatus::CompensationPending)
                .await;
            return Err(self.escalate(booking_id, "deposit release after reject"));
        }

        tracing::info!(booking_id = %booking_id, "booking rejected, deposit released");
        self.reload(booking_id).await
    }

    /// Cancellation by the rider or the driver. A confirmed booking gives
    /// its seats back; a pending request is treated as an implicit reject.
    /// Either way the deposit is released in full.
    pub async fn cancel(&self, booking_id: Uuid, actor_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;
        let ride = self
            .catalog
            .get_ride(booking.ride_id)
            .await?
            .ok_or(BookingError::RideNotFound)?;
        if actor_id != booking.rider_id && actor_id != ride.driver_id {
            return Err(BookingError::NotBookingParty);
        }

        let from = booking.status;
        if !matches!(from, BookingStatus::Requested | BookingStatus::Confirmed) {
            return Err(BookingError::InvalidTransition {
                from,
                to: BookingStatus::Cancelled,
            });
        }

        let won = self
            .bookings
            .transition(booking_id, from, BookingStatus::Cancelled)
            .await?;
        if !won {
            return Err(BookingError::InvalidTransition {
                from,
                to: BookingStatus::Cancelled,
            });
        }

        let mut clean = true;
        if from == BookingStatus::Confirmed {
            clean &= self
                .release_seats_with_retry(booking.ride_id, booking.seats)
                .await;
        }
        clean &= self
            .release_deposit_with_retry(booking.rider_id, booking.deposit, booking_id)
            .await;

        if !clean {
            let _ = self
                .bookings
                .transition(booking_id, BookingStatus::Cancelled, BookingStatus::CompensationPending)
                .await;
            return Err(self.escalate(booking_id, "unwind after cancel"));
        }

        tracing::info!(booking_id = %booking_id, from = %from, "booking cancelled");
        self.reload(booking_id).await
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        Ok(self.bookings.get(booking_id).await?)
    }

    pub async fn bookings_for_rider(&self, rider_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_for_rider(rider_id).await?)
    }

    /// Unwind partial effects of a failed create. When even the
    /// compensation fails, persist a `CompensationPending` record so the
    /// stuck money is visible to operators instead of silently lost.
    async fn unwind_create(
        &self,
        ride_id: Uuid,
        rider_id: Uuid,
        seats: u32,
        deposit: Money,
        booking_id: Uuid,
        seats_taken: bool,
    ) -> Result<(), BookingError> {
        let mut clean = true;
        if seats_taken {
            clean &= self.release_seats_with_retry(ride_id, seats).await;
        }
        clean &= self
            .release_deposit_with_retry(rider_id, deposit, booking_id)
            .await;

        if !clean {
            let diagnostic = Booking::new(
                booking_id,
                ride_id,
                rider_id,
                seats,
                0,
                deposit,
                BookingStatus::CompensationPending,
            );
            if let Err(err) = self.bookings.insert(&diagnostic).await {
                tracing::error!(booking_id = %booking_id, "failed to persist diagnostic record: {err}");
            }
            return Err(self.escalate(booking_id, "unwind after failed create"));
        }
        Ok(())
    }

    /// Retry a deposit release with bounded backoff. `release` is safe to
    /// retry: once the reservation is gone a repeat fails with
    /// `InsufficientReserved` instead of double-crediting.
    async fn release_deposit_with_retry(
        &self,
        rider_id: Uuid,
        deposit: Money,
        booking_id: Uuid,
    ) -> bool {
        let mut delay = self.config.compensation_backoff_ms;
        for attempt in 1..=self.config.compensation_attempts {
            match self.ledger.release(rider_id, deposit, Some(booking_id)).await {
                Ok(()) => return true,
                // Already released: an earlier attempt landed.
                Err(LedgerError::InsufficientReserved { .. }) => return true,
                Err(err) => {
                    tracing::warn!(
                        booking_id = %booking_id,
                        attempt,
                        "deposit release failed: {err}"
                    );
                }
            }
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = delay.saturating_mul(2);
        }
        false
    }

    /// Retry a seat release with bounded backoff; the counter clamps at
    /// `seats_total`, so repeats cannot oversupply.
    async fn release_seats_with_retry(&self, ride_id: Uuid, seats: u32) -> bool {
        let mut delay = self.config.compensation_backoff_ms;
        for attempt in 1..=self.config.compensation_attempts {
            match self.inventory.release_seats(ride_id, seats).await {
                Ok(_) => return true,
                Err(err) => {
                    tracing::warn!(ride_id = %ride_id, attempt, "seat release failed: {err}");
                }
            }
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = delay.saturating_mul(2);
        }
        false
    }

    fn escalate(&self, booking_id: Uuid, what: &str) -> BookingError {
        tracing::error!(
            booking_id = %booking_id,
            "compensation exhausted ({what}); wallet/inventory need reconciliation"
        );
        BookingError::CompensationFailure(format!("booking {booking_id}: {what}"))
    }

    async fn reload(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }
}
