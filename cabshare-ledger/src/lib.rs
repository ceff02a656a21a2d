pub mod ledger;
pub mod memory;
pub mod models;
pub mod settlement;

pub use ledger::{LedgerError, LedgerStore};
pub use memory::MemoryLedger;
pub use models::{TransactionPage, TxKind, WalletSummary, WalletTransaction};
pub use settlement::{
    MemorySettlementStore, Settlement, SettlementError, SettlementPage, SettlementStatus,
    SettlementStore,
};
