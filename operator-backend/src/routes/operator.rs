//! Operator endpoints: prices, valuations, request execution and operations

use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, warn};
use volo_vault::{
    record::{BorrowRequest, Custody},
    OperationSummary, VaultSummary, WithdrawPayout,
};

use crate::{
    error::Result,
    state::{now_ms, AppState},
    types::{
        AddCoinBody, AddPositionBody, ExecuteDepositBody, ExecuteDepositResponse,
        ExecuteWithdrawBody, LendingHealthBody, LendingHealthResponse, PublishPriceBody,
        RemoveAssetBody, UpdateValueBody, ValueResponse,
    },
};

/// Create operator router
pub fn operator_router(state: AppState) -> Router {
    Router::new()
        .route("/api/operator/prices", post(publish_price))
        .route("/api/operator/values", post(update_value))
        .route("/api/operator/deposits/execute", post(execute_deposit))
        .route("/api/operator/withdrawals/execute", post(execute_withdraw))
        .route("/api/operator/operation/start", post(start_operation))
        .route("/api/operator/operation/return", post(return_assets))
        .route("/api/operator/operation/reconcile", post(reconcile))
        .route("/api/operator/assets/coin", post(add_coin))
        .route("/api/operator/assets/position", post(add_position))
        .route("/api/operator/assets/remove", post(remove_asset))
        .route("/api/operator/lending-health", post(lending_health))
        .with_state(state)
}

/// POST /api/operator/prices
async fn publish_price(
    State(state): State<AppState>,
    Json(req): Json<PublishPriceBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault.publish_price(&req.asset, req.feed);
            Ok(host.vault.summary())
        })
        .await?;
    info!(asset = %req.asset, price = req.feed.price, "Price published");
    Ok(Json(summary))
}

/// POST /api/operator/values
async fn update_value(
    State(state): State<AppState>,
    Json(req): Json<UpdateValueBody>,
) -> Result<Json<ValueResponse>> {
    let now = now_ms();
    let usd_value = state
        .with_vault(|host| {
            host.vault
                .update_asset_value(&req.asset, req.market.as_ref(), now)
        })
        .await?;
    Ok(Json(ValueResponse {
        asset: req.asset,
        usd_value,
    }))
}

/// POST /api/operator/deposits/execute
async fn execute_deposit(
    State(state): State<AppState>,
    Json(req): Json<ExecuteDepositBody>,
) -> Result<Json<ExecuteDepositResponse>> {
    let now = now_ms();
    let shares = state
        .with_vault(|host| {
            host.vault.execute_deposit(
                &host.operator,
                req.request_id,
                req.max_shares_received,
                now,
            )
        })
        .await?;

    info!(request_id = req.request_id, %shares, "Deposit executed");
    Ok(Json(ExecuteDepositResponse {
        request_id: req.request_id,
        shares,
    }))
}

/// POST /api/operator/withdrawals/execute
async fn execute_withdraw(
    State(state): State<AppState>,
    Json(req): Json<ExecuteWithdrawBody>,
) -> Result<Json<WithdrawPayout>> {
    let now = now_ms();
    let payout = state
        .with_vault(|host| {
            host.vault.execute_withdraw(
                &host.operator,
                req.request_id,
                req.max_amount_received,
                now,
            )
        })
        .await?;

    info!(
        request_id = payout.request_id,
        recipient = %payout.recipient,
        amount = payout.amount,
        fee = payout.fee,
        "Withdraw executed"
    );
    Ok(Json(payout))
}

/// POST /api/operator/operation/start
///
/// The returned custody is what the operator must hand back on
/// `/api/operator/operation/return`, with positions refreshed.
async fn start_operation(
    State(state): State<AppState>,
    Json(req): Json<BorrowRequest>,
) -> Result<Json<Custody>> {
    let now = now_ms();
    let custody = state
        .with_vault(|host| host.vault.start_operation(&host.operator, req, now))
        .await?;

    info!(
        principal = custody.principal,
        coins = custody.coins.len(),
        positions = custody.positions.len(),
        "Operation started"
    );
    Ok(Json(custody))
}

/// POST /api/operator/operation/return
async fn return_assets(
    State(state): State<AppState>,
    Json(custody): Json<Custody>,
) -> Result<Json<VaultSummary>> {
    let now = now_ms();
    let summary = state
        .with_vault(|host| {
            host.vault
                .end_operation_returns(&host.operator, custody, now)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/operator/operation/reconcile
async fn reconcile(State(state): State<AppState>) -> Result<Json<OperationSummary>> {
    let now = now_ms();
    let result = state
        .with_vault(|host| host.vault.end_operation_reconcile(&host.operator, now))
        .await;

    match result {
        Ok(summary) => {
            info!(loss = %summary.loss, "Operation reconciled");
            Ok(Json(summary))
        }
        Err(err) => {
            warn!(error = %err, "Reconciliation rejected");
            Err(err)
        }
    }
}

/// POST /api/operator/assets/coin
async fn add_coin(
    State(state): State<AppState>,
    Json(req): Json<AddCoinBody>,
) -> Result<Json<VaultSummary>> {
    let now = now_ms();
    let summary = state
        .with_vault(|host| {
            host.vault
                .add_coin_asset(&host.operator, req.asset, req.decimals, now)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/operator/assets/position
///
/// Positions use the default adaptor for their kind.
async fn add_position(
    State(state): State<AppState>,
    Json(req): Json<AddPositionBody>,
) -> Result<Json<VaultSummary>> {
    let now = now_ms();
    let summary = state
        .with_vault(|host| {
            host.vault
                .add_position(&host.operator, req.asset, req.position, None, now)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/operator/assets/remove
async fn remove_asset(
    State(state): State<AppState>,
    Json(req): Json<RemoveAssetBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault.remove_asset(&host.operator, &req.asset)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/operator/lending-health
async fn lending_health(
    State(state): State<AppState>,
    Json(req): Json<LendingHealthBody>,
) -> Result<Json<LendingHealthResponse>> {
    let now = now_ms();
    let health_factor = state
        .with_vault(|host| {
            host.vault.verify_lending_health(
                &host.operator,
                &req.asset,
                &req.market,
                req.min_health_factor,
                now,
            )
        })
        .await?;
    Ok(Json(LendingHealthResponse {
        asset: req.asset,
        health_factor,
    }))
}
