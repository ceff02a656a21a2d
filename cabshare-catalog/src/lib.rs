pub mod inventory;
pub mod ride;

pub use inventory::{InventoryError, MemoryInventory, SeatInventory};
pub use ride::{CatalogError, RideCatalog, RideSnapshot, RideStatus, RideType};
