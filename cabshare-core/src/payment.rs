use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Created,
    Paid,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Created => "created",
            IntentStatus::Paid => "paid",
        }
    }
}

/// A wallet top-up intent. The gateway is an external collaborator; the
/// core only records the intent and credits the wallet once the gateway
/// reports the order as paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositIntent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Money,
    pub method: String,
    pub gateway_order_id: String,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("Deposit intent not found")]
    NotFound,

    #[error("Payment already processed")]
    AlreadyProcessed,

    #[error("Payment verification failed")]
    VerificationFailed,

    #[error("Deposit amount must be positive")]
    InvalidAmount,

    #[error("Intent storage error: {0}")]
    Storage(String),
}

/// External payment gateway adapter.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an order with the gateway, returning its order id.
    async fn create_order(&self, user_id: Uuid, amount: Money) -> Result<String, IntentError>;

    /// Verify a gateway callback signature for a completed payment.
    async fn verify(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, IntentError>;
}

/// Durable store for deposit intents. `mark_paid` must be a guarded
/// transition from `created` so a replayed callback cannot credit twice.
#[async_trait]
pub trait DepositIntentStore: Send + Sync {
    async fn insert(&self, intent: &DepositIntent) -> Result<(), IntentError>;

    async fn find_by_order(&self, gateway_order_id: &str)
        -> Result<Option<DepositIntent>, IntentError>;

    /// Transition `created -> paid`. Returns false when the intent was
    /// already paid (lost the race or a duplicate callback).
    async fn mark_paid(&self, id: Uuid, payment_id: &str) -> Result<bool, IntentError>;
}

/// Gateway stand-in for tests and local runs. Signatures of the form
/// `sig-{payment_id}` verify; anything else is rejected.
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(&self, _user_id: Uuid, _amount: Money) -> Result<String, IntentError> {
        Ok(format!("order_{}", Uuid::new_v4().simple()))
    }

    async fn verify(
        &self,
        _gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, IntentError> {
        Ok(signature == format!("sig-{payment_id}"))
    }
}

/// In-memory intent store backing tests.
#[derive(Default)]
pub struct MemoryIntentStore {
    intents: Mutex<HashMap<Uuid, DepositIntent>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepositIntentStore for MemoryIntentStore {
    async fn insert(&self, intent: &DepositIntent) -> Result<(), IntentError> {
        let mut intents = self.intents.lock().unwrap();
        intents.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn find_by_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<DepositIntent>, IntentError> {
        let intents = self.intents.lock().unwrap();
        Ok(intents
            .values()
            .find(|i| i.gateway_order_id == gateway_order_id)
            .cloned())
    }

    async fn mark_paid(&self, id: Uuid, _payment_id: &str) -> Result<bool, IntentError> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(&id).ok_or(IntentError::NotFound)?;
        if intent.status != IntentStatus::Created {
            return Ok(false);
        }
        intent.status = IntentStatus::Paid;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_signature() {
        let gw = MockGateway;
        assert!(gw.verify("order_x", "pay_1", "sig-pay_1").await.unwrap());
        assert!(!gw.verify("order_x", "pay_1", "bogus").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_paid_is_one_way() {
        let store = MemoryIntentStore::new();
        let intent = DepositIntent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: 500,
            method: "razorpay".to_string(),
            gateway_order_id: "order_abc".to_string(),
            status: IntentStatus::Created,
            created_at: Utc::now(),
        };
        store.insert(&intent).await.unwrap();

        assert!(store.mark_paid(intent.id, "pay_1").await.unwrap());
        // Duplicate callback must not transition a second time
        assert!(!store.mark_paid(intent.id, "pay_1").await.unwrap());
    }
}
