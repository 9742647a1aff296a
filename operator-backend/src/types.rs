//! Request/response types for the operator API

use serde::{Deserialize, Serialize};
use volo_vault::{
    adaptors::{MarketRef, Position},
    constants::{DEFAULT_LOSS_TOLERANCE_BPS, DEFAULT_ORACLE_STALENESS_MS},
    events::VaultEvent,
    math::u256_string,
    oracle::PriceFeed,
    requests::{DepositRequest, WithdrawRequest},
    Address, AssetType, U256,
};

fn u256_max() -> U256 {
    U256::MAX
}

fn u64_max() -> u64 {
    u64::MAX
}

// ---- user surface ----
//
// State-changing user requests carry the acting wallet, a unix timestamp in
// seconds and a base64 signature of the request message built by
// `RequestVerifier::request_message`.

/// Request body for a deposit request
#[derive(Debug, Deserialize)]
pub struct DepositBody {
    /// Wallet public key (base58); becomes the requester
    pub wallet: Address,
    /// Unix timestamp (must be within the tolerance window)
    pub timestamp: i64,
    pub request_signature: String,
    /// Existing receipt to credit; a new one is minted when absent
    #[serde(default)]
    pub receipt_id: Option<Address>,
    pub amount: u64,
    /// Minimum shares after fees (decimal string)
    #[serde(default, with = "u256_string")]
    pub expected_shares: U256,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub request_id: u64,
    pub receipt_id: Address,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub wallet: Address,
    pub timestamp: i64,
    pub request_signature: String,
    pub request_id: u64,
}

#[derive(Debug, Serialize)]
pub struct CancelDepositResponse {
    pub request_id: u64,
    pub refunded: u64,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawBody {
    pub wallet: Address,
    pub timestamp: i64,
    pub request_signature: String,
    pub receipt_id: Address,
    #[serde(with = "u256_string")]
    pub shares: U256,
    /// Minimum principal received after fees
    #[serde(default)]
    pub expected_amount: u64,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub request_id: u64,
}

#[derive(Debug, Serialize)]
pub struct CancelWithdrawResponse {
    pub request_id: u64,
    #[serde(with = "u256_string")]
    pub released_shares: U256,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub wallet: Address,
    pub timestamp: i64,
    pub request_signature: String,
    pub receipt_id: Address,
    pub new_owner: Address,
}

#[derive(Debug, Serialize)]
pub struct RatioResponse {
    #[serde(with = "u256_string")]
    pub total_usd_value: U256,
    #[serde(with = "u256_string")]
    pub share_ratio: U256,
    #[serde(with = "u256_string")]
    pub total_shares: U256,
}

#[derive(Debug, Deserialize)]
pub struct PreviewDepositQuery {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct PreviewWithdrawQuery {
    #[serde(with = "u256_string")]
    pub shares: U256,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// Shares minted or principal paid out, as a decimal string
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PendingRequestsResponse {
    pub deposits: Vec<DepositRequest>,
    pub withdrawals: Vec<WithdrawRequest>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events with a sequence number above this
    #[serde(default)]
    pub since: u64,
}

/// Vault event with its position in the backend's event log
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub recorded_at_ms: u64,
    pub event: VaultEvent,
}

// ---- operator surface ----

#[derive(Debug, Deserialize)]
pub struct PublishPriceBody {
    pub asset: AssetType,
    pub feed: PriceFeed,
}

#[derive(Debug, Deserialize)]
pub struct UpdateValueBody {
    pub asset: AssetType,
    #[serde(default)]
    pub market: Option<MarketRef>,
}

#[derive(Debug, Serialize)]
pub struct ValueResponse {
    pub asset: AssetType,
    #[serde(with = "u256_string")]
    pub usd_value: U256,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteDepositBody {
    pub request_id: u64,
    #[serde(default = "u256_max", with = "u256_string")]
    pub max_shares_received: U256,
}

#[derive(Debug, Serialize)]
pub struct ExecuteDepositResponse {
    pub request_id: u64,
    #[serde(with = "u256_string")]
    pub shares: U256,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteWithdrawBody {
    pub request_id: u64,
    #[serde(default = "u64_max")]
    pub max_amount_received: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddCoinBody {
    pub asset: AssetType,
    pub decimals: u8,
}

#[derive(Debug, Deserialize)]
pub struct AddPositionBody {
    pub asset: AssetType,
    pub position: Position,
}

#[derive(Debug, Deserialize)]
pub struct RemoveAssetBody {
    pub asset: AssetType,
}

#[derive(Debug, Deserialize)]
pub struct LendingHealthBody {
    pub asset: AssetType,
    pub market: MarketRef,
    #[serde(with = "u256_string")]
    pub min_health_factor: U256,
}

#[derive(Debug, Serialize)]
pub struct LendingHealthResponse {
    pub asset: AssetType,
    #[serde(with = "u256_string")]
    pub health_factor: U256,
}

// ---- admin surface ----

#[derive(Debug, Deserialize)]
pub struct LossToleranceBody {
    pub loss_tolerance_bps: u32,
}

#[derive(Debug, Deserialize)]
pub struct FeeRatesBody {
    pub deposit_fee_bps: u32,
    pub withdraw_fee_bps: u32,
}

#[derive(Debug, Deserialize)]
pub struct LockingTimesBody {
    pub withdraw_ms: u64,
    pub cancel_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct StalenessBody {
    pub staleness_window_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct OperatorFrozenBody {
    pub frozen: bool,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveFeesBody {
    pub amount: u64,
}

#[derive(Debug, Serialize)]
pub struct RetrieveFeesResponse {
    pub amount: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
    pub vault: Address,
}

/// Configuration for the backend server
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,

    /// API keys for the user surface
    pub api_keys: Vec<String>,

    /// API keys for the operator surface
    pub operator_api_keys: Vec<String>,

    /// API keys for the admin surface
    pub admin_api_keys: Vec<String>,

    /// Principal coin of the hosted vault
    pub principal_asset: String,

    pub principal_decimals: u8,

    pub loss_tolerance_bps: u32,

    pub oracle_staleness_ms: u64,

    /// Accepted clock skew for signed user requests, in seconds
    pub timestamp_tolerance_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            cors_origins: vec!["http://localhost:3000".to_string()],
            api_keys: vec![],
            operator_api_keys: vec![],
            admin_api_keys: vec![],
            principal_asset: "SUI".to_string(),
            principal_decimals: 9,
            loss_tolerance_bps: DEFAULT_LOSS_TOLERANCE_BPS,
            oracle_staleness_ms: DEFAULT_ORACLE_STALENESS_MS,
            timestamp_tolerance_secs: 300, // 5 minutes
        }
    }
}

fn key_list(var: &str) -> Vec<String> {
    std::env::var(var)
        .ok()
        .map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or(defaults.cors_origins);

        Self {
            port: parsed("PORT", defaults.port),
            cors_origins,
            api_keys: key_list("API_KEYS"),
            operator_api_keys: key_list("OPERATOR_API_KEYS"),
            admin_api_keys: key_list("ADMIN_API_KEYS"),
            principal_asset: std::env::var("PRINCIPAL_ASSET").unwrap_or(defaults.principal_asset),
            principal_decimals: parsed("PRINCIPAL_DECIMALS", defaults.principal_decimals),
            loss_tolerance_bps: parsed("LOSS_TOLERANCE_BPS", defaults.loss_tolerance_bps),
            oracle_staleness_ms: parsed("ORACLE_STALENESS_MS", defaults.oracle_staleness_ms),
            timestamp_tolerance_secs: parsed(
                "TIMESTAMP_TOLERANCE_SECS",
                defaults.timestamp_tolerance_secs,
            ),
        }
    }
}
