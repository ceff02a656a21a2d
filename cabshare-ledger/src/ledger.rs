use async_trait::async_trait;
use cabshare_core::Money;
use uuid::Uuid;

use crate::models::{TransactionPage, WalletSummary};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    #[error("Insufficient reserved funds: requested {requested}, reserved {reserved}")]
    InsufficientReserved { requested: Money, reserved: Money },

    #[error("Ledger amount must be positive")]
    InvalidAmount,

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

/// Wallet balances plus an append-only transaction log. Every mutating
/// call moves money and appends exactly one transaction in the same
/// atomic unit; balances and log can never diverge, and neither balance
/// ever goes negative.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Move `amount` from available to reserved. Fails with
    /// `InsufficientFunds` without any effect.
    async fn reserve(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError>;

    /// Move `amount` from reserved back to available. A release beyond
    /// the reserved balance fails with `InsufficientReserved` and credits
    /// nothing, which is what makes compensation retries safe.
    async fn release(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError>;

    /// Consume `amount` of reserved funds permanently (ride completion).
    async fn capture(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError>;

    /// Add `amount` to available funds (verified wallet top-up). Creates
    /// the wallet on first use.
    async fn credit(&self, user_id: Uuid, amount: Money, note: &str) -> Result<(), LedgerError>;

    /// Current balances; an untouched wallet reads as zeroes.
    async fn summary(&self, user_id: Uuid) -> Result<WalletSummary, LedgerError>;

    /// Transaction history, newest first. `page` starts at 1.
    async fn transactions(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<TransactionPage, LedgerError>;
}
