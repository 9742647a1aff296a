use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    adaptors::Position,
    math::{u256_string, U256},
    oracle::OracleConfig,
    state::{Address, AssetType, VaultConfig},
};

/// Configuration copied at `start_operation`; reconciliation reads only this
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub vault: VaultConfig,
    pub oracle: OracleConfig,
}

/// State of the single in-flight operation, owned by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub operator_cap: Address,
    pub borrowed_asset_types: BTreeSet<AssetType>,
    pub updated_asset_types: BTreeSet<AssetType>,
    pub value_update_enabled: bool,
    #[serde(with = "u256_string")]
    pub usd_value_snapshot: U256,
    #[serde(with = "u256_string")]
    pub shares_snapshot: U256,
    pub started_at_ms: u64,
    pub config: ConfigSnapshot,
    /// Positions as handed out; returned snapshots must keep their identity
    pub borrowed_positions: BTreeMap<AssetType, Position>,
    /// Value of the principal and coin amounts taken out, at start valuations
    #[serde(with = "u256_string")]
    pub borrowed_fungible_usd_value: U256,
}

impl OperationRecord {
    /// Borrowed assets that have not been revalued yet
    pub fn missing_updates(&self) -> Vec<AssetType> {
        self.borrowed_asset_types
            .difference(&self.updated_asset_types)
            .cloned()
            .collect()
    }
}

/// Assets an operator wants to take out of the vault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRequest {
    #[serde(default)]
    pub principal_amount: u64,
    #[serde(default)]
    pub coins: BTreeMap<AssetType, u64>,
    #[serde(default)]
    pub positions: Vec<AssetType>,
}

/// Assets held by the operator during an operation.
///
/// Positions come back as fresh snapshots of the external protocol state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Custody {
    #[serde(default)]
    pub principal: u64,
    #[serde(default)]
    pub coins: BTreeMap<AssetType, u64>,
    #[serde(default)]
    pub positions: BTreeMap<AssetType, Position>,
}
