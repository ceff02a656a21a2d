use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use cabshare_booking::{
    Booking, BookingError, BookingStatus, BookingStore, EscrowConfig, EscrowOrchestrator,
    MemoryBookingStore, StoreError,
};
use cabshare_catalog::{MemoryInventory, RideSnapshot, RideStatus, RideType};
use cabshare_core::Money;
use cabshare_ledger::{LedgerStore, MemoryLedger, WalletSummary};

struct Harness {
    inventory: Arc<MemoryInventory>,
    ledger: Arc<MemoryLedger>,
    orchestrator: Arc<EscrowOrchestrator>,
}

impl Harness {
    fn new() -> Self {
        let inventory = Arc::new(MemoryInventory::new());
        let ledger = Arc::new(MemoryLedger::new());
        let bookings = Arc::new(MemoryBookingStore::new());
        let orchestrator = Arc::new(EscrowOrchestrator::new(
            inventory.clone(),
            inventory.clone(),
            ledger.clone(),
            bookings.clone(),
            EscrowConfig::default(),
        ));
        Self {
            inventory,
            ledger,
            orchestrator,
        }
    }

    fn add_ride(&self, seats: u32, price: Money, ride_type: RideType, auto: bool) -> RideSnapshot {
        let ride = RideSnapshot {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            seats_total: seats,
            seats_available: seats,
            price_per_seat: price,
            ride_type,
            allow_auto_confirm: auto,
            status: RideStatus::Published,
        };
        self.inventory.insert_ride(ride.clone());
        ride
    }

    fn rider_with(&self, available: Money) -> Uuid {
        let rider = Uuid::new_v4();
        self.ledger.seed(rider, available);
        rider
    }

    async fn wallet(&self, user: Uuid) -> WalletSummary {
        self.ledger.summary(user).await.unwrap()
    }
}

#[tokio::test]
async fn auto_confirm_happy_path() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, true);
    let rider = h.rider_with(50);

    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.fare_total, 200);
    assert_eq!(booking.deposit, 20);
    assert_eq!(h.inventory.seats_available(ride.id), Some(2));

    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (30, 20));
}

#[tokio::test]
async fn insufficient_funds_leaves_no_trace() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, true);
    let rider = h.rider_with(5);

    let err = h
        .orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InsufficientFunds { required: 20, available: 5 }
    ));

    assert_eq!(h.inventory.seats_available(ride.id), Some(4));
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (5, 0));
    let page = h.ledger.transactions(rider, 1, 10).await.unwrap();
    assert_eq!(page.total, 0, "a rejected reserve records nothing");
}

#[tokio::test]
async fn manual_request_then_reject_refunds_deposit() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, false);
    let rider = h.rider_with(50);

    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Requested);
    // A pending request holds funds, not inventory
    assert_eq!(h.inventory.seats_available(ride.id), Some(4));
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (30, 20));

    let rejected = h
        .orchestrator
        .reject(booking.id, ride.driver_id)
        .await
        .unwrap();
    assert_eq!(rejected.status, BookingStatus::Rejected);
    assert_eq!(h.inventory.seats_available(ride.id), Some(4));
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (50, 0));
}

#[tokio::test]
async fn manual_request_then_approve_takes_seats() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::CommercialPool, false);
    let rider = h.rider_with(100);

    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap();
    assert_eq!(booking.deposit, 60); // 30% of 200

    let approved = h
        .orchestrator
        .approve(booking.id, ride.driver_id)
        .await
        .unwrap();
    assert_eq!(approved.status, BookingStatus::Confirmed);
    assert_eq!(h.inventory.seats_available(ride.id), Some(2));

    // Double-approve is an invalid transition, never silently ignored
    let err = h
        .orchestrator
        .approve(booking.id, ride.driver_id)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }));
    assert_eq!(h.inventory.seats_available(ride.id), Some(2));
}

#[tokio::test]
async fn approve_fails_when_ride_filled_up() {
    let h = Harness::new();
    let ride = h.add_ride(2, 100, RideType::PrivatePool, false);
    let rider_a = h.rider_with(100);

    let pending = h
        .orchestrator
        .create_booking(ride.id, rider_a, 2)
        .await
        .unwrap();

    // The ride fills up before the driver gets around to approving
    use cabshare_catalog::SeatInventory;
    h.inventory.try_reserve_seats(ride.id, 2).await.unwrap();

    let err = h
        .orchestrator
        .approve(pending.id, ride.driver_id)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InsufficientSeats { .. }));

    // Booking stays Requested with its deposit still held
    let b = h
        .orchestrator
        .get_booking(pending.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.status, BookingStatus::Requested);
    let w = h.wallet(rider_a).await;
    assert_eq!((w.available, w.reserved), (80, 20));
}

/// Booking store whose `transition` can be made to fail, for exercising
/// the compensation paths around status writes.
struct FlakyBookingStore {
    inner: MemoryBookingStore,
    fail_transitions: AtomicBool,
}

impl FlakyBookingStore {
    fn new() -> Self {
        Self {
            inner: MemoryBookingStore::new(),
            fail_transitions: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl BookingStore for FlakyBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        self.inner.insert(booking).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        self.inner.get(id).await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("connection reset".into()));
        }
        self.inner.transition(id, from, to).await
    }

    async fn list_for_rider(&self, rider_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_for_rider(rider_id).await
    }
}

#[tokio::test]
async fn approve_releases_seats_when_status_write_fails() {
    let inventory = Arc::new(MemoryInventory::new());
    let ledger = Arc::new(MemoryLedger::new());
    let bookings = Arc::new(FlakyBookingStore::new());
    let orchestrator = EscrowOrchestrator::new(
        inventory.clone(),
        inventory.clone(),
        ledger.clone(),
        bookings.clone(),
        EscrowConfig {
            compensation_attempts: 3,
            compensation_backoff_ms: 1,
        },
    );

    let ride = RideSnapshot {
        id: Uuid::new_v4(),
        driver_id: Uuid::new_v4(),
        seats_total: 4,
        seats_available: 4,
        price_per_seat: 100,
        ride_type: RideType::PrivatePool,
        allow_auto_confirm: false,
        status: RideStatus::Published,
    };
    inventory.insert_ride(ride.clone());
    let rider = Uuid::new_v4();
    ledger.seed(rider, 50);

    let pending = orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap();

    bookings.fail_transitions.store(true, Ordering::SeqCst);
    let err = orchestrator
        .approve(pending.id, ride.driver_id)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Storage(_)));

    // The seats taken ahead of the failed write went back
    assert_eq!(inventory.seats_available(ride.id), Some(4));

    // Booking stays Requested with its deposit still held, so the driver
    // can retry once storage recovers
    bookings.fail_transitions.store(false, Ordering::SeqCst);
    let b = orchestrator
        .get_booking(pending.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.status, BookingStatus::Requested);
    let w = ledger.summary(rider).await.unwrap();
    assert_eq!((w.available, w.reserved), (30, 20));

    let approved = orchestrator
        .approve(pending.id, ride.driver_id)
        .await
        .unwrap();
    assert_eq!(approved.status, BookingStatus::Confirmed);
    assert_eq!(inventory.seats_available(ride.id), Some(2));
}

#[tokio::test]
async fn race_on_last_seat_has_one_winner() {
    let h = Harness::new();
    let ride = h.add_ride(1, 100, RideType::PrivatePool, true);
    let rider_a = h.rider_with(50);
    let rider_b = h.rider_with(50);

    let orch = h.orchestrator.clone();
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let mut handles = Vec::new();
    for rider in [rider_a, rider_b] {
        let orch = orch.clone();
        let barrier = barrier.clone();
        let ride_id = ride.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            orch.create_booking(ride_id, rider, 1).await
        }));
    }

    let mut confirmed = 0;
    let mut lost = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(b) => {
                assert_eq!(b.status, BookingStatus::Confirmed);
                confirmed += 1;
            }
            Err(BookingError::InsufficientSeats { .. }) => lost += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((confirmed, lost), (1, 1));
    assert_eq!(h.inventory.seats_available(ride.id), Some(0));

    // The loser's deposit was compensated back in full
    let wa = h.wallet(rider_a).await;
    let wb = h.wallet(rider_b).await;
    let reserved_total = wa.reserved + wb.reserved;
    let available_total = wa.available + wb.available;
    assert_eq!(reserved_total, 10);
    assert_eq!(available_total, 90);
    assert!(wa.available == 50 || wb.available == 50, "loser fully refunded");
}

#[tokio::test]
async fn no_oversell_under_concurrent_load() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, true);

    let orch = h.orchestrator.clone();
    let barrier = Arc::new(tokio::sync::Barrier::new(10));
    let mut handles = Vec::new();
    for _ in 0..10 {
        let rider = h.rider_with(1000);
        let orch = orch.clone();
        let barrier = barrier.clone();
        let ride_id = ride.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            (rider, orch.create_booking(ride_id, rider, 2).await)
        }));
    }

    let mut confirmed_seats = 0;
    for handle in handles {
        let (rider, result) = handle.await.unwrap();
        match result {
            Ok(b) => {
                confirmed_seats += b.seats;
                let w = h.ledger.summary(rider).await.unwrap();
                assert_eq!((w.available, w.reserved), (980, 20));
            }
            Err(BookingError::InsufficientSeats { .. }) => {
                let w = h.ledger.summary(rider).await.unwrap();
                assert_eq!((w.available, w.reserved), (1000, 0));
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(confirmed_seats, 4, "confirmed seats never exceed seats_total");
    assert_eq!(h.inventory.seats_available(ride.id), Some(0));
}

#[tokio::test]
async fn cancel_after_confirm_restores_everything() {
    let h = Harness::new();
    let ride = h.add_ride(4, 150, RideType::PrivatePool, true);
    let rider = h.rider_with(100);

    // fare 300, deposit 30
    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap();
    assert_eq!(booking.deposit, 30);
    assert_eq!(h.inventory.seats_available(ride.id), Some(2));

    let cancelled = h.orchestrator.cancel(booking.id, rider).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(h.inventory.seats_available(ride.id), Some(4));
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (100, 0));

    // Second cancel fails, and nothing moves twice
    let err = h.orchestrator.cancel(booking.id, rider).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }));
    assert_eq!(h.inventory.seats_available(ride.id), Some(4));
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (100, 0));
}

#[tokio::test]
async fn cancel_of_pending_request_is_implicit_reject() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, false);
    let rider = h.rider_with(50);

    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 2)
        .await
        .unwrap();

    let cancelled = h.orchestrator.cancel(booking.id, rider).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    // Seats were never held, so nothing to give back
    assert_eq!(h.inventory.seats_available(ride.id), Some(4));
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (50, 0));
}

#[tokio::test]
async fn validation_failures_before_any_effect() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, true);
    let rider = h.rider_with(50);

    let err = h
        .orchestrator
        .create_booking(Uuid::new_v4(), rider, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::RideNotFound));

    let err = h
        .orchestrator
        .create_booking(ride.id, ride.driver_id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SelfBookingForbidden));

    let err = h
        .orchestrator
        .create_booking(ride.id, rider, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidSeatCount));

    let err = h
        .orchestrator
        .create_booking(ride.id, rider, 9)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InsufficientSeats { .. }));

    let mut closed = h.add_ride(4, 100, RideType::PrivatePool, true);
    closed.status = RideStatus::Closed;
    h.inventory.insert_ride(closed.clone());
    let err = h
        .orchestrator
        .create_booking(closed.id, rider, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::RideNotPublished));

    // None of the failures touched the wallet
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (50, 0));
}

#[tokio::test]
async fn only_parties_may_act() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::PrivatePool, false);
    let rider = h.rider_with(50);
    let stranger = Uuid::new_v4();

    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 1)
        .await
        .unwrap();

    let err = h.orchestrator.approve(booking.id, stranger).await.unwrap_err();
    assert!(matches!(err, BookingError::NotRideDriver));

    let err = h.orchestrator.reject(booking.id, rider).await.unwrap_err();
    assert!(matches!(err, BookingError::NotRideDriver));

    let err = h.orchestrator.cancel(booking.id, stranger).await.unwrap_err();
    assert!(matches!(err, BookingError::NotBookingParty));

    // Driver may cancel a pending request; deposit flows back
    let cancelled = h
        .orchestrator
        .cancel(booking.id, ride.driver_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    let w = h.wallet(rider).await;
    assert_eq!((w.available, w.reserved), (50, 0));
}

#[tokio::test]
async fn ledger_replay_matches_after_full_lifecycle() {
    let h = Harness::new();
    let ride = h.add_ride(4, 100, RideType::CommercialFull, true);
    let rider = h.rider_with(0);
    h.ledger.credit(rider, 500, "top-up").await.unwrap();

    let booking = h
        .orchestrator
        .create_booking(ride.id, rider, 3)
        .await
        .unwrap();
    h.orchestrator.cancel(booking.id, rider).await.unwrap();

    let page = h.ledger.transactions(rider, 1, 100).await.unwrap();
    let mut replayed = WalletSummary::default();
    for tx in page.items.iter().rev() {
        replayed.apply(tx);
    }
    assert_eq!(replayed, h.wallet(rider).await);
}
