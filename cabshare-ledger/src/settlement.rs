use async_trait::async_trait;
use cabshare_core::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Settlement lifecycle. `Requested` holds the funds reserved; `Paid` is
/// set by the payout operator once the money has left the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Requested,
    Paid,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Requested => "requested",
            SettlementStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(SettlementStatus::Requested),
            "paid" => Some(SettlementStatus::Paid),
            _ => None,
        }
    }
}

/// A payout request against a user's available balance. The requested
/// amount sits in the reserved balance until the payout completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Money,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
}

impl Settlement {
    pub fn new(user_id: Uuid, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            status: SettlementStatus::Requested,
            created_at: Utc::now(),
        }
    }
}

/// One page of a user's settlement history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPage {
    pub items: Vec<Settlement>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("Settlement storage error: {0}")]
    Storage(String),
}

/// Durable settlement records. The funds themselves live in the ledger;
/// this store only tracks the payout requests against them.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn insert(&self, settlement: &Settlement) -> Result<(), SettlementError>;

    /// Settlement history, newest first. `page` starts at 1.
    async fn list(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<SettlementPage, SettlementError>;
}

/// In-memory settlement store for tests.
#[derive(Default)]
pub struct MemorySettlementStore {
    settlements: Mutex<HashMap<Uuid, Settlement>>,
}

impl MemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementStore for MemorySettlementStore {
    async fn insert(&self, settlement: &Settlement) -> Result<(), SettlementError> {
        let mut settlements = self.settlements.lock().unwrap();
        settlements.insert(settlement.id, settlement.clone());
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<SettlementPage, SettlementError> {
        let settlements = self.settlements.lock().unwrap();
        let mut all: Vec<Settlement> = settlements
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = page.max(1);
        let total = all.len() as u64;
        let offset = (page as u64 - 1) * per_page as u64;
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .collect();

        Ok(SettlementPage {
            items,
            page,
            per_page,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_scoped_and_newest_first() {
        let store = MemorySettlementStore::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        for amount in [100, 200, 300] {
            store.insert(&Settlement::new(user, amount)).await.unwrap();
        }
        store.insert(&Settlement::new(other, 999)).await.unwrap();

        let page = store.list(user, 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|s| s.user_id == user));
        assert!(page.items[0].created_at >= page.items[1].created_at);
    }
}
