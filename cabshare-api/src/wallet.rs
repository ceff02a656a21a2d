use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cabshare_core::payment::{DepositIntent, IntentError, IntentStatus};
use cabshare_core::Money;
use cabshare_ledger::{LedgerError, Settlement, SettlementPage, TransactionPage, WalletSummary};

use crate::auth;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CreateDepositRequest {
    pub amount: Money,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "upi".to_string()
}

#[derive(Debug, Serialize)]
pub struct DepositIntentResponse {
    pub intent_id: Uuid,
    pub gateway_order_id: String,
    pub amount: Money,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyDepositRequest {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyDepositResponse {
    pub intent_id: Uuid,
    pub amount: Money,
    pub status: String,
    pub wallet: WalletSummary,
}

#[derive(Debug, Deserialize)]
pub struct SettlementRequest {
    pub amount: Money,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/wallet", get(wallet_summary))
        .route("/v1/wallet/transactions", get(wallet_transactions))
        .route("/v1/wallet/deposits", post(create_deposit))
        .route("/v1/wallet/deposits/verify", post(verify_deposit))
        .route(
            "/v1/wallet/settlements",
            post(request_settlement).get(list_settlements),
        )
}

/// GET /v1/wallet
async fn wallet_summary(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<WalletSummary>, AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    let summary = state.ledger.summary(user_id).await?;
    Ok(Json(summary))
}

/// GET /v1/wallet/transactions?page=1&per_page=20
async fn wallet_transactions(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionPage>, AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    if query.page == 0 {
        return Err(AppError::ValidationError("page starts at 1".to_string()));
    }
    let per_page = query
        .per_page
        .clamp(1, state.business_rules.transactions_per_page_cap);

    let page = state
        .ledger
        .transactions(user_id, query.page, per_page)
        .await?;
    Ok(Json(page))
}

/// POST /v1/wallet/settlements
///
/// Payout request against the available balance. The amount moves to the
/// reserved balance and stays there until the payout completes; the
/// settlement row is the operator's work queue.
async fn request_settlement(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(req): Json<SettlementRequest>,
) -> Result<(StatusCode, Json<Settlement>), AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    if req.amount <= 0 {
        return Err(LedgerError::InvalidAmount.into());
    }

    // First effect; InsufficientFunds aborts with nothing to unwind
    state.ledger.reserve(user_id, req.amount, None).await?;

    let settlement = Settlement::new(user_id, req.amount);
    if let Err(err) = state.settlements.insert(&settlement).await {
        // Give the reservation back before surfacing the failure
        if let Err(release_err) = state.ledger.release(user_id, req.amount, None).await {
            tracing::error!(
                user_id = %user_id,
                amount = req.amount,
                "settlement reservation stuck, wallet needs reconciliation: {release_err}"
            );
        }
        return Err(err.into());
    }

    tracing::info!(settlement_id = %settlement.id, user_id = %user_id, amount = req.amount, "settlement requested");
    Ok((StatusCode::CREATED, Json(settlement)))
}

/// GET /v1/wallet/settlements?page=1&per_page=20
async fn list_settlements(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<SettlementPage>, AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    if query.page == 0 {
        return Err(AppError::ValidationError("page starts at 1".to_string()));
    }
    let per_page = query
        .per_page
        .clamp(1, state.business_rules.transactions_per_page_cap);

    let page = state
        .settlements
        .list(user_id, query.page, per_page)
        .await?;
    Ok(Json(page))
}

/// POST /v1/wallet/deposits
///
/// Registers a top-up order with the payment gateway and records the
/// intent. No money moves until the gateway callback is verified.
async fn create_deposit(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(req): Json<CreateDepositRequest>,
) -> Result<(StatusCode, Json<DepositIntentResponse>), AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    if req.amount <= 0 {
        return Err(IntentError::InvalidAmount.into());
    }

    let gateway_order_id = state.gateway.create_order(user_id, req.amount).await?;
    let intent = DepositIntent {
        id: Uuid::new_v4(),
        user_id,
        amount: req.amount,
        method: req.method,
        gateway_order_id: gateway_order_id.clone(),
        status: IntentStatus::Created,
        created_at: Utc::now(),
    };
    state.intents.insert(&intent).await?;

    tracing::info!(intent_id = %intent.id, user_id = %user_id, amount = req.amount, "deposit intent created");
    Ok((
        StatusCode::CREATED,
        Json(DepositIntentResponse {
            intent_id: intent.id,
            gateway_order_id,
            amount: intent.amount,
            status: intent.status.as_str().to_string(),
        }),
    ))
}

/// POST /v1/wallet/deposits/verify
///
/// Verifies the gateway signature, then marks the intent paid through a
/// guarded transition before crediting the wallet. A replayed callback
/// loses the transition and gets a 409 instead of a second credit.
async fn verify_deposit(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(req): Json<VerifyDepositRequest>,
) -> Result<Json<VerifyDepositResponse>, AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    let intent = state
        .intents
        .find_by_order(&req.gateway_order_id)
        .await?
        .ok_or(IntentError::NotFound)?;
    if intent.user_id != user_id {
        return Err(AppError::AuthorizationError(
            "Deposit belongs to another user".to_string(),
        ));
    }

    let valid = state
        .gateway
        .verify(&req.gateway_order_id, &req.payment_id, &req.signature)
        .await?;
    if !valid {
        return Err(IntentError::VerificationFailed.into());
    }

    if !state.intents.mark_paid(intent.id, &req.payment_id).await? {
        return Err(IntentError::AlreadyProcessed.into());
    }

    state
        .ledger
        .credit(
            user_id,
            intent.amount,
            &format!("wallet top-up via {}", intent.method),
        )
        .await?;

    tracing::info!(intent_id = %intent.id, user_id = %user_id, amount = intent.amount, "deposit verified and credited");
    let wallet = state.ledger.summary(user_id).await?;
    Ok(Json(VerifyDepositResponse {
        intent_id: intent.id,
        amount: intent.amount,
        status: IntentStatus::Paid.as_str().to_string(),
        wallet,
    }))
}
