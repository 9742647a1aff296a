use serde::{Deserialize, Serialize};

use crate::{
    constants::RATE_SCALING,
    error::{Result, VaultError},
    math::{mul_div, usd_value_of, Rounding, U256},
    require,
    state::{Address, AssetType},
};

use super::{MarketRef, Position, PositionAdaptor, ValuationContext};

/// One reserve of a lending account, as reported by the lending market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingReserve {
    pub coin_type: AssetType,
    pub decimals: u8,
    pub supplied: u128,
    /// Interest earned but not yet compounded into `supplied`
    pub accrued_supply_interest: u128,
    pub borrowed: u128,
    pub accrued_borrow_interest: u128,
    pub liquidation_threshold_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPosition {
    pub market_id: Address,
    pub reserves: Vec<LendingReserve>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingMarketRef {
    pub market_id: Address,
    pub reserve_coin_types: Vec<AssetType>,
}

/// Collateral and debt of a lending position in USD (18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingBreakdown {
    pub collateral_usd: U256,
    pub debt_usd: U256,
    /// Collateral weighted by liquidation thresholds
    pub weighted_collateral_usd: U256,
}

/// Values supply-minus-borrow positions on lending markets
#[derive(Debug, Clone, Copy, Default)]
pub struct LendingAdaptor;

impl LendingAdaptor {
    fn check_market(asset: &AssetType, position: &LendingPosition, market: &MarketRef) -> Result<()> {
        let MarketRef::Lending(market) = market else {
            return Err(VaultError::MarketMismatch(asset.clone()));
        };
        require!(
            market.market_id == position.market_id,
            VaultError::MarketMismatch(asset.clone())
        );
        for reserve in &position.reserves {
            require!(
                market.reserve_coin_types.contains(&reserve.coin_type),
                VaultError::MarketMismatch(asset.clone())
            );
        }
        Ok(())
    }

    pub fn breakdown(
        &self,
        asset: &AssetType,
        position: &Position,
        market: &MarketRef,
        ctx: &ValuationContext<'_>,
    ) -> Result<LendingBreakdown> {
        let Position::Lending(position) = position else {
            return Err(VaultError::MarketMismatch(asset.clone()));
        };
        Self::check_market(asset, position, market)?;

        let mut collateral = U256::zero();
        let mut weighted = U256::zero();
        let mut debt = U256::zero();

        for reserve in &position.reserves {
            let price = ctx.price(&reserve.coin_type)?.price;

            let supply_amount = U256::from(reserve.supplied)
                .checked_add(U256::from(reserve.accrued_supply_interest))
                .ok_or(VaultError::MathOverflow)?;
            let supply_usd = usd_value_of(supply_amount, price, reserve.decimals)?;

            let borrow_amount = U256::from(reserve.borrowed)
                .checked_add(U256::from(reserve.accrued_borrow_interest))
                .ok_or(VaultError::MathOverflow)?;
            let borrow_usd = usd_value_of(borrow_amount, price, reserve.decimals)?;

            let weighted_usd = mul_div(
                supply_usd,
                U256::from(reserve.liquidation_threshold_bps),
                U256::from(RATE_SCALING),
                Rounding::Floor,
            )?;

            collateral = collateral.checked_add(supply_usd).ok_or(VaultError::MathOverflow)?;
            weighted = weighted.checked_add(weighted_usd).ok_or(VaultError::MathOverflow)?;
            debt = debt.checked_add(borrow_usd).ok_or(VaultError::MathOverflow)?;
        }

        Ok(LendingBreakdown {
            collateral_usd: collateral,
            debt_usd: debt,
            weighted_collateral_usd: weighted,
        })
    }

    /// Health factor with 18 decimals; `U256::MAX` when there is no debt
    pub fn health_factor(breakdown: &LendingBreakdown) -> Result<U256> {
        if breakdown.debt_usd.is_zero() {
            return Ok(U256::MAX);
        }
        mul_div(
            breakdown.weighted_collateral_usd,
            crate::math::ratio_unit(),
            breakdown.debt_usd,
            Rounding::Floor,
        )
    }
}

impl PositionAdaptor for LendingAdaptor {
    fn name(&self) -> &'static str {
        "lending"
    }

    fn value(
        &self,
        asset: &AssetType,
        position: &Position,
        market: &MarketRef,
        ctx: &ValuationContext<'_>,
    ) -> Result<U256> {
        let breakdown = self.breakdown(asset, position, market, ctx)?;
        // Underwater accounts are worth nothing to the vault
        Ok(breakdown.collateral_usd.saturating_sub(breakdown.debt_usd))
    }
}
