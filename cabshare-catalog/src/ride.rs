use async_trait::async_trait;
use cabshare_core::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideType {
    PrivatePool,
    CommercialPool,
    CommercialFull,
}

impl RideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideType::PrivatePool => "private_pool",
            RideType::CommercialPool => "commercial_pool",
            RideType::CommercialFull => "commercial_full",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private_pool" => Some(RideType::PrivatePool),
            "commercial_pool" => Some(RideType::CommercialPool),
            "commercial_full" => Some(RideType::CommercialFull),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Published,
    Closed,
}

/// Read-side view of a ride as the booking flow needs it. Route, stop and
/// vehicle data stay with the catalog owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideSnapshot {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub seats_total: u32,
    pub seats_available: u32,
    pub price_per_seat: Money,
    pub ride_type: RideType,
    pub allow_auto_confirm: bool,
    pub status: RideStatus,
}

impl RideSnapshot {
    pub fn fare_for(&self, seats: u32) -> Money {
        self.price_per_seat * seats as Money
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog storage error: {0}")]
    Storage(String),
}

/// Ride lookup as seen by the escrow flow.
#[async_trait]
pub trait RideCatalog: Send + Sync {
    async fn get_ride(&self, id: Uuid) -> Result<Option<RideSnapshot>, CatalogError>;
}
