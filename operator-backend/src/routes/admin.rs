//! Admin endpoints: configuration, status, freezing, fees and recovery

use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, warn};
use volo_vault::{oracle::OracleConfig, VaultConfig, VaultSummary};

use crate::{
    error::Result,
    state::{now_ms, AppState},
    types::{
        EnabledBody, FeeRatesBody, LockingTimesBody, LossToleranceBody, OperatorFrozenBody,
        RetrieveFeesBody, RetrieveFeesResponse, StalenessBody,
    },
};

/// Create admin router
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/config", post(set_config))
        .route("/api/admin/loss-tolerance", post(set_loss_tolerance))
        .route("/api/admin/fee-rates", post(set_fee_rates))
        .route("/api/admin/locking-times", post(set_locking_times))
        .route("/api/admin/oracle-config", post(set_oracle_config))
        .route("/api/admin/oracle-staleness", post(set_oracle_staleness))
        .route("/api/admin/enabled", post(set_enabled))
        .route("/api/admin/operator-frozen", post(set_operator_frozen))
        .route("/api/admin/fees/retrieve", post(retrieve_fees))
        .route("/api/admin/force-recover", post(force_recover))
        .with_state(state)
}

/// POST /api/admin/config
async fn set_config(
    State(state): State<AppState>,
    Json(config): Json<VaultConfig>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault.set_config(&host.admin, config)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/loss-tolerance
async fn set_loss_tolerance(
    State(state): State<AppState>,
    Json(req): Json<LossToleranceBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault
                .set_loss_tolerance(&host.admin, req.loss_tolerance_bps)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/fee-rates
async fn set_fee_rates(
    State(state): State<AppState>,
    Json(req): Json<FeeRatesBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault
                .set_fee_rates(&host.admin, req.deposit_fee_bps, req.withdraw_fee_bps)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/locking-times
async fn set_locking_times(
    State(state): State<AppState>,
    Json(req): Json<LockingTimesBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault
                .set_locking_times(&host.admin, req.withdraw_ms, req.cancel_ms)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/oracle-config
async fn set_oracle_config(
    State(state): State<AppState>,
    Json(config): Json<OracleConfig>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault.set_oracle_config(&host.admin, config)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/oracle-staleness
async fn set_oracle_staleness(
    State(state): State<AppState>,
    Json(req): Json<StalenessBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault
                .set_oracle_staleness_window(&host.admin, req.staleness_window_ms)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/enabled
async fn set_enabled(
    State(state): State<AppState>,
    Json(req): Json<EnabledBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            host.vault.set_enabled(&host.admin, req.enabled)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/operator-frozen
///
/// Freezes or unfreezes the operator capability held by this backend.
async fn set_operator_frozen(
    State(state): State<AppState>,
    Json(req): Json<OperatorFrozenBody>,
) -> Result<Json<VaultSummary>> {
    let summary = state
        .with_vault(|host| {
            let operator_cap = host.operator.id();
            host.vault
                .set_operator_frozen(&host.admin, operator_cap, req.frozen)?;
            Ok(host.vault.summary())
        })
        .await?;
    Ok(Json(summary))
}

/// POST /api/admin/fees/retrieve
async fn retrieve_fees(
    State(state): State<AppState>,
    Json(req): Json<RetrieveFeesBody>,
) -> Result<Json<RetrieveFeesResponse>> {
    let amount = state
        .with_vault(|host| host.vault.retrieve_fees(&host.admin, req.amount))
        .await?;
    info!(amount, "Fees retrieved");
    Ok(Json(RetrieveFeesResponse { amount }))
}

/// POST /api/admin/force-recover
async fn force_recover(State(state): State<AppState>) -> Result<Json<VaultSummary>> {
    let now = now_ms();
    let summary = state
        .with_vault(|host| {
            host.vault.force_recover(&host.admin, now)?;
            Ok(host.vault.summary())
        })
        .await?;
    warn!(vault = %summary.id, "Vault force-recovered");
    Ok(Json(summary))
}
