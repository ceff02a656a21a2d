use async_trait::async_trait;
use cabshare_core::Money;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::ledger::{LedgerError, LedgerStore};
use crate::models::{TransactionPage, TxKind, WalletSummary, WalletTransaction};

#[derive(Default)]
struct LedgerState {
    wallets: HashMap<Uuid, WalletSummary>,
    log: Vec<WalletTransaction>,
}

/// In-memory ledger. The single mutex makes each balance-plus-append
/// mutation atomic, mirroring the one-transaction contract the Postgres
/// implementation gets from sqlx transactions.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a wallet directly, for tests.
    pub fn seed(&self, user_id: Uuid, available: Money) {
        let mut state = self.state.lock().unwrap();
        state.wallets.insert(
            user_id,
            WalletSummary {
                available,
                reserved: 0,
            },
        );
    }

    fn append(
        state: &mut LedgerState,
        user_id: Uuid,
        kind: TxKind,
        amount: Money,
        ref_booking_id: Option<Uuid>,
        note: Option<String>,
    ) {
        state.log.push(WalletTransaction {
            id: Uuid::new_v4(),
            user_id,
            kind,
            amount,
            ref_booking_id,
            note,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn reserve(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut state = self.state.lock().unwrap();
        let wallet = state.wallets.entry(user_id).or_default();

        if wallet.available < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: wallet.available,
            });
        }

        wallet.available -= amount;
        wallet.reserved += amount;
        Self::append(&mut state, user_id, TxKind::Reserve, amount, ref_booking_id, None);
        Ok(())
    }

    async fn release(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut state = self.state.lock().unwrap();
        let wallet = state.wallets.entry(user_id).or_default();

        if wallet.reserved < amount {
            return Err(LedgerError::InsufficientReserved {
                requested: amount,
                reserved: wallet.reserved,
            });
        }

        wallet.reserved -= amount;
        wallet.available += amount;
        Self::append(&mut state, user_id, TxKind::Release, amount, ref_booking_id, None);
        Ok(())
    }

    async fn capture(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut state = self.state.lock().unwrap();
        let wallet = state.wallets.entry(user_id).or_default();

        if wallet.reserved < amount {
            return Err(LedgerError::InsufficientReserved {
                requested: amount,
                reserved: wallet.reserved,
            });
        }

        wallet.reserved -= amount;
        Self::append(&mut state, user_id, TxKind::Capture, amount, ref_booking_id, None);
        Ok(())
    }

    async fn credit(&self, user_id: Uuid, amount: Money, note: &str) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut state = self.state.lock().unwrap();
        let wallet = state.wallets.entry(user_id).or_default();
        wallet.available += amount;
        Self::append(
            &mut state,
            user_id,
            TxKind::Deposit,
            amount,
            None,
            Some(note.to_string()),
        );
        Ok(())
    }

    async fn summary(&self, user_id: Uuid) -> Result<WalletSummary, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state.wallets.get(&user_id).copied().unwrap_or_default())
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<TransactionPage, LedgerError> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<WalletTransaction> = state
            .log
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        all.reverse(); // newest first

        let page = page.max(1);
        let total = all.len() as u64;
        // Widen before multiplying; page comes straight off the query string
        let offset = (page as u64 - 1) * per_page as u64;
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .collect();

        Ok(TransactionPage {
            items,
            page,
            per_page,
            total,
        })
    }
}
