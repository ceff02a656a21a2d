pub mod deposit;
pub mod models;
pub mod orchestrator;
pub mod store;

pub use deposit::deposit_for;
pub use models::{Booking, BookingStatus};
pub use orchestrator::{BookingError, EscrowConfig, EscrowOrchestrator};
pub use store::{BookingStore, MemoryBookingStore, StoreError};
