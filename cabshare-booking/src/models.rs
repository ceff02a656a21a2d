use cabshare_core::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking lifecycle. `Requested` holds funds but no inventory;
/// `Confirmed` holds both. `Rejected` and `Cancelled` are terminal.
/// `CompensationPending` is a diagnostic dead-end entered only when a
/// compensating refund could not be applied after retries; it marks money
/// that needs operator attention, never a normal outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    Rejected,
    Cancelled,
    CompensationPending,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CompensationPending => "compensation_pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(BookingStatus::Requested),
            "confirmed" => Some(BookingStatus::Confirmed),
            "rejected" => Some(BookingStatus::Rejected),
            "cancelled" => Some(BookingStatus::Cancelled),
            "compensation_pending" => Some(BookingStatus::CompensationPending),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Requested | BookingStatus::Confirmed)
    }

    /// Legal lifecycle edges. The stores enforce these atomically through
    /// guarded updates; this predicate is the single written-down truth.
    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (*self, to),
            (Requested, Confirmed)
                | (Requested, Rejected)
                | (Requested, Cancelled)
                | (Requested, CompensationPending)
                | (Confirmed, Cancelled)
                | (Confirmed, CompensationPending)
                | (Rejected, CompensationPending)
                | (Cancelled, CompensationPending)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One seat reservation against one ride. Owned by the orchestrator,
/// mutated only through status transitions, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub rider_id: Uuid,
    pub seats: u32,
    pub fare_total: Money,
    pub deposit: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        id: Uuid,
        ride_id: Uuid,
        rider_id: Uuid,
        seats: u32,
        fare_total: Money,
        deposit: Money,
        status: BookingStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            ride_id,
            rider_id,
            seats,
            fare_total,
            deposit,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use BookingStatus::*;
        assert!(Requested.can_transition_to(Confirmed));
        assert!(Requested.can_transition_to(Rejected));
        assert!(Requested.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use BookingStatus::*;
        for from in [Rejected, Cancelled] {
            for to in [Requested, Confirmed, Rejected, Cancelled] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
        // Double-confirm is illegal too
        assert!(!Confirmed.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Requested));
        assert!(!Confirmed.can_transition_to(Rejected));
    }

    #[test]
    fn test_status_round_trip() {
        use BookingStatus::*;
        for s in [Requested, Confirmed, Rejected, Cancelled, CompensationPending] {
            assert_eq!(BookingStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(BookingStatus::parse("pending"), None);
    }
}
