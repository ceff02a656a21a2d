use cabshare_core::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of ledger movement. `Refund` is reserved for gateway-initiated
/// refunds of a top-up; the booking flow itself only emits `Reserve` and
/// `Release`, with `Capture` firing at ride completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Reserve,
    Release,
    Capture,
    Refund,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Reserve => "reserve",
            TxKind::Release => "release",
            TxKind::Capture => "capture",
            TxKind::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TxKind::Deposit),
            "reserve" => Some(TxKind::Reserve),
            "release" => Some(TxKind::Release),
            "capture" => Some(TxKind::Capture),
            "refund" => Some(TxKind::Refund),
            _ => None,
        }
    }
}

/// Immutable ledger entry. Created once per balance mutation, never
/// updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TxKind,
    pub amount: Money,
    pub ref_booking_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletSummary {
    pub available: Money,
    pub reserved: Money,
}

impl WalletSummary {
    /// Apply one transaction's signed effect. Folding every transaction of
    /// a user over a zero summary must reproduce the stored balances; the
    /// ledger tests hold the store to that.
    pub fn apply(&mut self, tx: &WalletTransaction) {
        match tx.kind {
            TxKind::Deposit => self.available += tx.amount,
            TxKind::Reserve => {
                self.available -= tx.amount;
                self.reserved += tx.amount;
            }
            TxKind::Release => {
                self.reserved -= tx.amount;
                self.available += tx.amount;
            }
            TxKind::Capture => self.reserved -= tx.amount,
            TxKind::Refund => self.available -= tx.amount,
        }
    }
}

/// One page of a user's transaction history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<WalletTransaction>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}
