//! User-facing endpoints: requests, receipts and vault views
//!
//! State-changing requests act as the wallet that signed them.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use volo_vault::{receipt::Receipt, VaultSummary};

use super::parse_address;
use crate::{
    error::Result,
    services::UserAction,
    state::{now_ms, AppState},
    types::{
        CancelBody, CancelDepositResponse, CancelWithdrawResponse, DepositBody, DepositResponse,
        EventsQuery, PendingRequestsResponse, PreviewDepositQuery, PreviewResponse,
        PreviewWithdrawQuery, RatioResponse, RecordedEvent, TransferBody, WithdrawBody,
        WithdrawResponse,
    },
};

/// Create user router
pub fn vault_router(state: AppState) -> Router {
    Router::new()
        .route("/api/vault", get(summary))
        .route("/api/vault/ratio", get(ratio))
        .route("/api/vault/preview/deposit", get(preview_deposit))
        .route("/api/vault/preview/withdraw", get(preview_withdraw))
        .route("/api/vault/requests", get(pending_requests))
        .route("/api/vault/events", get(events))
        .route("/api/vault/receipts/{id}", get(receipt))
        .route("/api/vault/receipts/transfer", post(transfer_receipt))
        .route("/api/vault/deposit", post(request_deposit))
        .route("/api/vault/deposit/cancel", post(cancel_deposit))
        .route("/api/vault/withdraw", post(request_withdraw))
        .route("/api/vault/withdraw/cancel", post(cancel_withdraw))
        .with_state(state)
}

/// GET /api/vault
async fn summary(State(state): State<AppState>) -> Json<VaultSummary> {
    Json(state.read(|host| host.vault.summary()).await)
}

/// GET /api/vault/ratio
async fn ratio(State(state): State<AppState>) -> Result<Json<RatioResponse>> {
    let now = now_ms();
    let response = state
        .with_vault(|host| {
            let vault = &host.vault;
            Ok(RatioResponse {
                total_usd_value: vault.total_usd_value(now)?,
                share_ratio: vault.share_ratio(now)?,
                total_shares: vault.total_shares(),
            })
        })
        .await?;
    Ok(Json(response))
}

/// GET /api/vault/preview/deposit?amount=
async fn preview_deposit(
    State(state): State<AppState>,
    Query(query): Query<PreviewDepositQuery>,
) -> Result<Json<PreviewResponse>> {
    let now = now_ms();
    let shares = state
        .with_vault(|host| host.vault.preview_deposit(query.amount, now))
        .await?;
    Ok(Json(PreviewResponse {
        value: shares.to_string(),
    }))
}

/// GET /api/vault/preview/withdraw?shares=
async fn preview_withdraw(
    State(state): State<AppState>,
    Query(query): Query<PreviewWithdrawQuery>,
) -> Result<Json<PreviewResponse>> {
    let now = now_ms();
    let amount = state
        .with_vault(|host| host.vault.preview_withdraw(query.shares, now))
        .await?;
    Ok(Json(PreviewResponse {
        value: amount.to_string(),
    }))
}

/// GET /api/vault/requests
async fn pending_requests(State(state): State<AppState>) -> Json<PendingRequestsResponse> {
    let response = state
        .read(|host| PendingRequestsResponse {
            deposits: host.vault.pending_deposits().cloned().collect(),
            withdrawals: host.vault.pending_withdrawals().cloned().collect(),
        })
        .await;
    Json(response)
}

/// GET /api/vault/events?since=
async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<RecordedEvent>> {
    Json(state.read(|host| host.events_since(query.since)).await)
}

/// GET /api/vault/receipts/{id}
async fn receipt(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Receipt>> {
    let receipt_id = parse_address(&id)?;
    let receipt = state
        .with_vault(|host| host.vault.receipt(&receipt_id).cloned())
        .await?;
    Ok(Json(receipt))
}

/// POST /api/vault/deposit
async fn request_deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositBody>,
) -> Result<Json<DepositResponse>> {
    let requester = state
        .authorize(
            &req.wallet,
            req.timestamp,
            &req.request_signature,
            UserAction::Deposit {
                receipt_id: req.receipt_id,
                amount: req.amount,
                expected_shares: req.expected_shares,
            },
        )
        .await?;
    info!(requester = %requester, amount = req.amount, "Deposit requested");

    let now = now_ms();
    let (request_id, receipt_id) = state
        .with_vault(|host| {
            host.vault.request_deposit(
                requester,
                req.receipt_id,
                req.amount,
                req.expected_shares,
                now,
            )
        })
        .await?;

    Ok(Json(DepositResponse {
        request_id,
        receipt_id,
    }))
}

/// POST /api/vault/deposit/cancel
async fn cancel_deposit(
    State(state): State<AppState>,
    Json(req): Json<CancelBody>,
) -> Result<Json<CancelDepositResponse>> {
    let caller = state
        .authorize(
            &req.wallet,
            req.timestamp,
            &req.request_signature,
            UserAction::CancelDeposit {
                request_id: req.request_id,
            },
        )
        .await?;

    let now = now_ms();
    let refunded = state
        .with_vault(|host| host.vault.cancel_deposit(caller, req.request_id, now))
        .await?;

    info!(request_id = req.request_id, refunded, "Deposit cancelled");
    Ok(Json(CancelDepositResponse {
        request_id: req.request_id,
        refunded,
    }))
}

/// POST /api/vault/withdraw
async fn request_withdraw(
    State(state): State<AppState>,
    Json(req): Json<WithdrawBody>,
) -> Result<Json<WithdrawResponse>> {
    let caller = state
        .authorize(
            &req.wallet,
            req.timestamp,
            &req.request_signature,
            UserAction::Withdraw {
                receipt_id: req.receipt_id,
                shares: req.shares,
                expected_amount: req.expected_amount,
            },
        )
        .await?;
    info!(
        caller = %caller,
        receipt = %req.receipt_id,
        shares = %req.shares,
        "Withdraw requested"
    );

    let now = now_ms();
    let request_id = state
        .with_vault(|host| {
            host.vault.request_withdraw(
                caller,
                req.receipt_id,
                req.shares,
                req.expected_amount,
                now,
            )
        })
        .await?;

    Ok(Json(WithdrawResponse { request_id }))
}

/// POST /api/vault/withdraw/cancel
async fn cancel_withdraw(
    State(state): State<AppState>,
    Json(req): Json<CancelBody>,
) -> Result<Json<CancelWithdrawResponse>> {
    let caller = state
        .authorize(
            &req.wallet,
            req.timestamp,
            &req.request_signature,
            UserAction::CancelWithdraw {
                request_id: req.request_id,
            },
        )
        .await?;

    let now = now_ms();
    let released_shares = state
        .with_vault(|host| host.vault.cancel_withdraw(caller, req.request_id, now))
        .await?;

    info!(request_id = req.request_id, %released_shares, "Withdraw cancelled");
    Ok(Json(CancelWithdrawResponse {
        request_id: req.request_id,
        released_shares,
    }))
}

/// POST /api/vault/receipts/transfer
async fn transfer_receipt(
    State(state): State<AppState>,
    Json(req): Json<TransferBody>,
) -> Result<Json<Receipt>> {
    let caller = state
        .authorize(
            &req.wallet,
            req.timestamp,
            &req.request_signature,
            UserAction::TransferReceipt {
                receipt_id: req.receipt_id,
                new_owner: req.new_owner,
            },
        )
        .await?;

    let receipt = state
        .with_vault(|host| {
            host.vault
                .transfer_receipt(caller, req.receipt_id, req.new_owner)?;
            host.vault.receipt(&req.receipt_id).cloned()
        })
        .await?;

    info!(receipt = %req.receipt_id, new_owner = %req.new_owner, "Receipt transferred");
    Ok(Json(receipt))
}
