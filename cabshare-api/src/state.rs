use std::sync::Arc;

use cabshare_booking::EscrowOrchestrator;
use cabshare_core::payment::{DepositIntentStore, PaymentGateway};
use cabshare_ledger::{LedgerStore, SettlementStore};
use cabshare_store::app_config::BusinessRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<EscrowOrchestrator>,
    pub ledger: Arc<dyn LedgerStore>,
    pub settlements: Arc<dyn SettlementStore>,
    pub intents: Arc<dyn DepositIntentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
