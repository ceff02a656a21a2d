pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod intent_repo;
pub mod ride_repo;
pub mod settlement_repo;
pub mod wallet_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingStore;
pub use database::DbClient;
pub use intent_repo::PgIntentStore;
pub use ride_repo::PgRideStore;
pub use settlement_repo::PgSettlementStore;
pub use wallet_repo::PgLedger;
