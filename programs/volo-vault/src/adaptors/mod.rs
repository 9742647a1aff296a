//! Position adaptors value DeFi positions held by the vault.
//!
//! One adaptor is registered per position asset type. Each adaptor checks
//! that the market reference supplied by the caller is the market the
//! position actually lives in before pricing it.

pub mod clmm;
pub mod lending;
pub mod receipt;

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VaultError},
    math::U256,
    oracle::{OracleConfig, OracleGateway, OraclePrice},
    state::AssetType,
};

pub use clmm::{ConcentratedLiquidityAdaptor, LiquidityPosition, PoolRef};
pub use lending::{LendingAdaptor, LendingMarketRef, LendingPosition, LendingReserve};
pub use receipt::{ReceiptAdaptor, VaultReceiptPosition, VaultRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    Lending(LendingPosition),
    Liquidity(LiquidityPosition),
    Receipt(VaultReceiptPosition),
}

impl Position {
    /// Whether `updated` is a newer snapshot of the same external position.
    ///
    /// Kind, market identity and token decimals must match. A lending
    /// account may drop reserves but never gain one.
    pub fn same_identity(&self, updated: &Position) -> bool {
        match (self, updated) {
            (Position::Lending(a), Position::Lending(b)) => {
                a.market_id == b.market_id
                    && b.reserves.iter().all(|reserve| {
                        a.reserves.iter().any(|known| {
                            known.coin_type == reserve.coin_type
                                && known.decimals == reserve.decimals
                        })
                    })
            }
            (Position::Liquidity(a), Position::Liquidity(b)) => {
                a.pool_id == b.pool_id
                    && a.coin_a == b.coin_a
                    && a.coin_b == b.coin_b
                    && a.decimals_a == b.decimals_a
                    && a.decimals_b == b.decimals_b
            }
            (Position::Receipt(a), Position::Receipt(b)) => {
                a.vault_id == b.vault_id && a.receipt_id == b.receipt_id
            }
            _ => false,
        }
    }
}

/// Caller-supplied reference to the external market a position lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketRef {
    Lending(LendingMarketRef),
    Pool(PoolRef),
    Vault(VaultRef),
}

/// Everything an adaptor may read while valuing a position
pub struct ValuationContext<'a> {
    pub oracle: &'a OracleGateway,
    pub oracle_config: &'a OracleConfig,
    pub now_ms: u64,
    pub dex_slippage_bps: u32,
}

impl ValuationContext<'_> {
    pub fn price(&self, coin_type: &AssetType) -> Result<OraclePrice> {
        self.oracle
            .get_price_with(coin_type, self.now_ms, self.oracle_config)
    }
}

pub trait PositionAdaptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// USD value (18 decimals) of `position`, including owed components
    fn value(
        &self,
        asset: &AssetType,
        position: &Position,
        market: &MarketRef,
        ctx: &ValuationContext<'_>,
    ) -> Result<U256>;
}

/// Adaptor used when a position is registered without an explicit one
pub fn default_adaptor_for(position: &Position) -> Arc<dyn PositionAdaptor> {
    match position {
        Position::Lending(_) => Arc::new(LendingAdaptor),
        Position::Liquidity(_) => Arc::new(ConcentratedLiquidityAdaptor),
        Position::Receipt(_) => Arc::new(ReceiptAdaptor),
    }
}

#[derive(Clone, Default)]
pub struct AdaptorRegistry {
    by_asset: BTreeMap<AssetType, Arc<dyn PositionAdaptor>>,
}

impl AdaptorRegistry {
    pub fn register(&mut self, asset: &AssetType, adaptor: Arc<dyn PositionAdaptor>) {
        self.by_asset.insert(asset.clone(), adaptor);
    }

    pub fn remove(&mut self, asset: &AssetType) {
        self.by_asset.remove(asset);
    }

    pub fn get(&self, asset: &AssetType) -> Result<&Arc<dyn PositionAdaptor>> {
        self.by_asset
            .get(asset)
            .ok_or_else(|| VaultError::AdaptorNotFound(asset.clone()))
    }
}

impl fmt::Debug for AdaptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_asset.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}
