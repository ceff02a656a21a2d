use async_trait::async_trait;
use cabshare_core::Money;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cabshare_ledger::{
    LedgerError, LedgerStore, TransactionPage, TxKind, WalletSummary, WalletTransaction,
};

/// Ledger over Postgres. Each mutation runs as one database transaction:
/// a conditional balance UPDATE plus exactly one wallet_transactions
/// INSERT, so balances and log commit or roll back together.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn append_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        kind: TxKind,
        amount: Money,
        ref_booking_id: Option<Uuid>,
        note: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO wallet_transactions (id, user_id, tx_type, amount_inr, ref_booking_id, note) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind.as_str())
        .bind(amount)
        .bind(ref_booking_id)
        .bind(note)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn balances(&self, user_id: Uuid) -> Result<WalletSummary, LedgerError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT balance_available_inr, balance_reserved_inr FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row
            .map(|(available, reserved)| WalletSummary {
                available,
                reserved,
            })
            .unwrap_or_default())
    }
}

fn storage(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn reserve(
        &self,
        user_id: Uuid,
        amount: Money,
        ref_booking_id: Option<Uuid>,
    ) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let rows = sqlx::query(
            "UPDATE wallets SET balance_available_inr = balance_available_inr - $2, \
             balance_reserved_inr = balance_reserved_inr + $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance_available_inr >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();

        if rows == 0 {
            // Implicit rollback on drop
            let current = self.balances(user_id).await?;
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: current.available,
            });
        }

        Self::append_tx(&mut tx, user_id, TxKind::Reserve, amount, ref_booking_id, None)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)
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
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let rows = sqlx::query(
            "UPDATE wallets SET balance_reserved_inr = balance_reserved_inr - $2, \
             balance_available_inr = balance_available_inr + $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance_reserved_inr >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();

        if rows == 0 {
            let current = self.balances(user_id).await?;
            return Err(LedgerError::InsufficientReserved {
                requested: amount,
                reserved: current.reserved,
            });
        }

        Self::append_tx(&mut tx, user_id, TxKind::Release, amount, ref_booking_id, None)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)
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
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let rows = sqlx::query(
            "UPDATE wallets SET balance_reserved_inr = balance_reserved_inr - $2, \
             updated_at = NOW() WHERE user_id = $1 AND balance_reserved_inr >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();

        if rows == 0 {
            let current = self.balances(user_id).await?;
            return Err(LedgerError::InsufficientReserved {
                requested: amount,
                reserved: current.reserved,
            });
        }

        Self::append_tx(&mut tx, user_id, TxKind::Capture, amount, ref_booking_id, None)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)
    }

    async fn credit(&self, user_id: Uuid, amount: Money, note: &str) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Wallets are created lazily on first credit
        sqlx::query(
            "INSERT INTO wallets (user_id, balance_available_inr, balance_reserved_inr) \
             VALUES ($1, $2, 0) \
             ON CONFLICT (user_id) DO UPDATE SET \
             balance_available_inr = wallets.balance_available_inr + $2, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        Self::append_tx(&mut tx, user_id, TxKind::Deposit, amount, None, Some(note))
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)
    }

    async fn summary(&self, user_id: Uuid) -> Result<WalletSummary, LedgerError> {
        self.balances(user_id).await
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<TransactionPage, LedgerError> {
        let page = page.max(1);
        let offset = ((page - 1) as i64) * per_page as i64;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM wallet_transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;

        #[derive(sqlx::FromRow)]
        struct TxRow {
            id: Uuid,
            user_id: Uuid,
            tx_type: String,
            amount_inr: i64,
            ref_booking_id: Option<Uuid>,
            note: Option<String>,
            created_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, TxRow>(
            "SELECT id, user_id, tx_type, amount_inr, ref_booking_id, note, created_at \
             FROM wallet_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let items = rows
            .into_iter()
            .map(|r| {
                let kind = TxKind::parse(&r.tx_type)
                    .ok_or_else(|| LedgerError::Storage(format!("unknown tx_type {}", r.tx_type)))?;
                Ok(WalletTransaction {
                    id: r.id,
                    user_id: r.user_id,
                    kind,
                    amount: r.amount_inr,
                    ref_booking_id: r.ref_booking_id,
                    note: r.note,
                    created_at: r.created_at,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(TransactionPage {
            items,
            page,
            per_page,
            total: total as u64,
        })
    }
}
