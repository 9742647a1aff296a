use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VaultError},
    math::{deviation_bps, mul_div, price_unit, u256_string, usd_value_of, Rounding, U256},
    require,
    state::{Address, AssetType},
};

use super::{MarketRef, Position, PositionAdaptor, ValuationContext};

/// Concentrated-liquidity position decomposed into token amounts by the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub pool_id: Address,
    pub coin_a: AssetType,
    pub coin_b: AssetType,
    pub decimals_a: u8,
    pub decimals_b: u8,
    pub amount_a: u64,
    pub amount_b: u64,
    /// Swap fees earned by the position but not yet collected
    pub fees_owed_a: u64,
    pub fees_owed_b: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRef {
    pub pool_id: Address,
    pub coin_a: AssetType,
    pub coin_b: AssetType,
    /// Price of one whole `coin_a` in whole `coin_b`, 18 decimals
    #[serde(with = "u256_string")]
    pub price_a_in_b: U256,
}

/// Values CLMM positions (Cetus / Momentum style pools)
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcentratedLiquidityAdaptor;

impl ConcentratedLiquidityAdaptor {
    fn check_pool(asset: &AssetType, position: &LiquidityPosition, pool: &PoolRef) -> Result<()> {
        require!(
            pool.pool_id == position.pool_id
                && pool.coin_a == position.coin_a
                && pool.coin_b == position.coin_b,
            VaultError::MarketMismatch(asset.clone())
        );
        Ok(())
    }
}

impl PositionAdaptor for ConcentratedLiquidityAdaptor {
    fn name(&self) -> &'static str {
        "clmm"
    }

    fn value(
        &self,
        asset: &AssetType,
        position: &Position,
        market: &MarketRef,
        ctx: &ValuationContext<'_>,
    ) -> Result<U256> {
        let (Position::Liquidity(position), MarketRef::Pool(pool)) = (position, market) else {
            return Err(VaultError::MarketMismatch(asset.clone()));
        };
        Self::check_pool(asset, position, pool)?;

        let price_a = ctx.price(&position.coin_a)?.price;
        let price_b = ctx.price(&position.coin_b)?.price;

        // |pool - oracle| / oracle <= tolerance
        let oracle_a_in_b = mul_div(price_a, price_unit(), price_b, Rounding::Floor)?;
        let deviation = deviation_bps(pool.price_a_in_b, oracle_a_in_b)?;
        require!(
            deviation <= U256::from(ctx.dex_slippage_bps),
            VaultError::PoolPriceDeviation
        );

        let total_a = U256::from(position.amount_a) + U256::from(position.fees_owed_a);
        let total_b = U256::from(position.amount_b) + U256::from(position.fees_owed_b);

        let value_a = usd_value_of(total_a, price_a, position.decimals_a)?;
        let value_b = usd_value_of(total_b, price_b, position.decimals_b)?;

        value_a.checked_add(value_b).ok_or(VaultError::MathOverflow)
    }
}
