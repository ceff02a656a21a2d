use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cabshare_ledger::{
    Settlement, SettlementError, SettlementPage, SettlementStatus, SettlementStore,
};

pub struct PgSettlementStore {
    pool: PgPool,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SettlementRow {
    id: Uuid,
    user_id: Uuid,
    amount_inr: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl SettlementRow {
    fn into_settlement(self) -> Result<Settlement, SettlementError> {
        let status = SettlementStatus::parse(&self.status).ok_or_else(|| {
            SettlementError::Storage(format!("unknown settlement status {}", self.status))
        })?;
        Ok(Settlement {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount_inr,
            status,
            created_at: self.created_at,
        })
    }
}

fn storage(e: sqlx::Error) -> SettlementError {
    SettlementError::Storage(e.to_string())
}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn insert(&self, settlement: &Settlement) -> Result<(), SettlementError> {
        sqlx::query(
            "INSERT INTO settlements (id, user_id, amount_inr, status, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(settlement.id)
        .bind(settlement.user_id)
        .bind(settlement.amount)
        .bind(settlement.status.as_str())
        .bind(settlement.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<SettlementPage, SettlementError> {
        let page = page.max(1);
        let offset = ((page - 1) as i64) * per_page as i64;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settlements WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let rows = sqlx::query_as::<_, SettlementRow>(
            "SELECT id, user_id, amount_inr, status, created_at FROM settlements \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let items = rows
            .into_iter()
            .map(SettlementRow::into_settlement)
            .collect::<Result<Vec<_>, SettlementError>>()?;

        Ok(SettlementPage {
            items,
            page,
            per_page,
            total: total as u64,
        })
    }
}
