use serde::Serialize;

use crate::{
    math::{u256_string, U256},
    oracle::OracleConfig,
    state::{Address, AssetType, VaultConfig, VaultStatus},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultCreated {
    pub vault: Address,
    pub principal: AssetType,
    pub admin_cap: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorCapCreated {
    pub vault: Address,
    pub operator_cap: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorFreezeChanged {
    pub vault: Address,
    pub operator_cap: Address,
    pub frozen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositRequested {
    pub vault: Address,
    pub request_id: u64,
    pub receipt_id: Address,
    pub requester: Address,
    pub amount: u64,
    #[serde(with = "u256_string")]
    pub expected_shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositCancelled {
    pub vault: Address,
    pub request_id: u64,
    pub receipt_id: Address,
    pub requester: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositExecuted {
    pub vault: Address,
    pub request_id: u64,
    pub receipt_id: Address,
    pub amount: u64,
    pub fee: u64,
    #[serde(with = "u256_string")]
    pub shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawRequested {
    pub vault: Address,
    pub request_id: u64,
    pub receipt_id: Address,
    pub requester: Address,
    #[serde(with = "u256_string")]
    pub shares: U256,
    pub expected_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawCancelled {
    pub vault: Address,
    pub request_id: u64,
    pub receipt_id: Address,
    pub requester: Address,
    #[serde(with = "u256_string")]
    pub shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawExecuted {
    pub vault: Address,
    pub request_id: u64,
    pub receipt_id: Address,
    pub recipient: Address,
    #[serde(with = "u256_string")]
    pub shares: U256,
    pub amount: u64,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptTransferred {
    pub vault: Address,
    pub receipt_id: Address,
    pub previous_owner: Address,
    pub new_owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationStarted {
    pub vault: Address,
    pub operator_cap: Address,
    pub borrowed: Vec<AssetType>,
    #[serde(with = "u256_string")]
    pub usd_value_before: U256,
    #[serde(with = "u256_string")]
    pub shares_before: U256,
    pub started_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetsReturned {
    pub vault: Address,
    pub returned: Vec<AssetType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetValueUpdated {
    pub vault: Address,
    pub asset: AssetType,
    #[serde(with = "u256_string")]
    pub usd_value: U256,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LossToleranceReset {
    pub vault: Address,
    pub epoch: u64,
    #[serde(with = "u256_string")]
    pub base_usd_value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationCompleted {
    pub vault: Address,
    #[serde(with = "u256_string")]
    pub usd_value_before: U256,
    #[serde(with = "u256_string")]
    pub usd_value_after: U256,
    #[serde(with = "u256_string")]
    pub loss: U256,
    #[serde(with = "u256_string")]
    pub cur_epoch_loss: U256,
    #[serde(with = "u256_string")]
    pub loss_limit: U256,
}

/// Emitted when reconciliation is refused so off-chain operators can diagnose
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationRejected {
    pub vault: Address,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmergencyRecovery {
    pub vault: Address,
    pub admin_cap: Address,
    pub started_at_ms: u64,
    pub recovered_at_ms: u64,
    #[serde(with = "u256_string")]
    pub usd_value_before: U256,
    #[serde(with = "u256_string")]
    pub usd_value_after: U256,
    /// Value charged to the epoch: assets still out plus known shortfall
    #[serde(with = "u256_string")]
    pub loss: U256,
    #[serde(with = "u256_string")]
    pub shares_before: U256,
    #[serde(with = "u256_string")]
    pub shares_after: U256,
    pub borrowed: Vec<AssetType>,
    pub unreturned: Vec<AssetType>,
    pub not_updated: Vec<AssetType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStatusChanged {
    pub vault: Address,
    pub status: VaultStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigUpdated {
    pub vault: Address,
    pub config: VaultConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleConfigUpdated {
    pub vault: Address,
    pub config: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetAdded {
    pub vault: Address,
    pub asset: AssetType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRemoved {
    pub vault: Address,
    pub asset: AssetType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeesRetrieved {
    pub vault: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthVerified {
    pub vault: Address,
    pub asset: AssetType,
    #[serde(with = "u256_string")]
    pub health_factor: U256,
    #[serde(with = "u256_string")]
    pub min_health_factor: U256,
}

macro_rules! vault_events {
    ($($name:ident),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(tag = "event", content = "data")]
        pub enum VaultEvent {
            $($name($name),)*
        }

        $(
            impl From<$name> for VaultEvent {
                fn from(event: $name) -> Self {
                    VaultEvent::$name(event)
                }
            }
        )*
    };
}

vault_events!(
    VaultCreated,
    OperatorCapCreated,
    OperatorFreezeChanged,
    DepositRequested,
    DepositCancelled,
    DepositExecuted,
    WithdrawRequested,
    WithdrawCancelled,
    WithdrawExecuted,
    ReceiptTransferred,
    OperationStarted,
    AssetsReturned,
    AssetValueUpdated,
    LossToleranceReset,
    OperationCompleted,
    ReconciliationRejected,
    EmergencyRecovery,
    VaultStatusChanged,
    ConfigUpdated,
    OracleConfigUpdated,
    AssetAdded,
    AssetRemoved,
    FeesRetrieved,
    HealthVerified,
);
