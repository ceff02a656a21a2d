use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cabshare_core::payment::{DepositIntent, DepositIntentStore, IntentError, IntentStatus};

pub struct PgIntentStore {
    pool: PgPool,
}

impl PgIntentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IntentRow {
    id: Uuid,
    user_id: Uuid,
    amount_inr: i64,
    method: String,
    gateway_order_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

fn storage(e: sqlx::Error) -> IntentError {
    IntentError::Storage(e.to_string())
}

#[async_trait]
impl DepositIntentStore for PgIntentStore {
    async fn insert(&self, intent: &DepositIntent) -> Result<(), IntentError> {
        sqlx::query(
            "INSERT INTO deposit_intents (id, user_id, amount_inr, method, gateway_order_id, \
             status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(intent.id)
        .bind(intent.user_id)
        .bind(intent.amount)
        .bind(&intent.method)
        .bind(&intent.gateway_order_id)
        .bind(intent.status.as_str())
        .bind(intent.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn find_by_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<DepositIntent>, IntentError> {
        let row = sqlx::query_as::<_, IntentRow>(
            "SELECT id, user_id, amount_inr, method, gateway_order_id, status, created_at \
             FROM deposit_intents WHERE gateway_order_id = $1",
        )
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(|r| {
            let status = match r.status.as_str() {
                "created" => IntentStatus::Created,
                "paid" => IntentStatus::Paid,
                other => {
                    return Err(IntentError::Storage(format!("unknown intent status {other}")))
                }
            };
            Ok(DepositIntent {
                id: r.id,
                user_id: r.user_id,
                amount: r.amount_inr,
                method: r.method,
                gateway_order_id: r.gateway_order_id,
                status,
                created_at: r.created_at,
            })
        })
        .transpose()
    }

    async fn mark_paid(&self, id: Uuid, payment_id: &str) -> Result<bool, IntentError> {
        // Guarded one-way transition; a duplicate callback matches no row
        let rows = sqlx::query(
            "UPDATE deposit_intents SET status = 'paid', gateway_payment_id = $2, \
             updated_at = NOW() WHERE id = $1 AND status = 'created'",
        )
        .bind(id)
        .bind(payment_id)
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .rows_affected();

        Ok(rows == 1)
    }
}
