use tracing::debug;

use crate::{
    adaptors::{LendingAdaptor, MarketRef, Position, ValuationContext},
    error::{Result, VaultError},
    events::{AssetValueUpdated, HealthVerified},
    math::{usd_value_of, U256},
    oracle::{OracleConfig, PriceFeed},
    require,
    state::{AssetType, OperatorCap, Vault, VaultStatus},
};

impl Vault {
    /// Oracle config and pool tolerance in force: the operation snapshot
    /// while one is running, the live values otherwise.
    fn pricing_params(&self) -> (OracleConfig, u32) {
        match &self.operation {
            Some(record) => (
                record.config.oracle.clone(),
                record.config.vault.dex_slippage_bps,
            ),
            None => (self.oracle.config().clone(), self.config.dex_slippage_bps),
        }
    }

    /// Feed a raw oracle update into the gateway
    pub fn publish_price(&mut self, asset: &AssetType, feed: PriceFeed) {
        self.oracle.publish(asset, feed);
    }

    /// Recompute and store the USD value of one held asset.
    ///
    /// Principal and coins are priced from the oracle; positions go through
    /// their registered adaptor and need a `market` reference. Updating the
    /// same asset twice at the same timestamp yields the same state.
    pub fn update_asset_value(
        &mut self,
        asset: &AssetType,
        market: Option<&MarketRef>,
        now_ms: u64,
    ) -> Result<U256> {
        if self.status == VaultStatus::DuringOperation {
            let enabled = self
                .operation
                .as_ref()
                .is_some_and(|record| record.value_update_enabled);
            require!(enabled, VaultError::ValueUpdateDisabled);
        }
        require!(
            !self.valuations.is_borrowed(asset),
            VaultError::AssetBorrowed(asset.clone())
        );

        let (oracle_config, dex_slippage_bps) = self.pricing_params();

        let usd_value = if *asset == self.principal {
            self.coin_value(asset, self.free_principal, self.principal_decimals, now_ms, &oracle_config)?
        } else if let Some(holding) = self.coins.get(asset) {
            self.coin_value(asset, holding.balance, holding.decimals, now_ms, &oracle_config)?
        } else if let Some(position) = self.positions.get(asset) {
            let market = market.ok_or_else(|| VaultError::MarketMismatch(asset.clone()))?;
            let adaptor = self.adaptors.get(asset)?;
            let ctx = ValuationContext {
                oracle: &self.oracle,
                oracle_config: &oracle_config,
                now_ms,
                dex_slippage_bps,
            };
            adaptor.value(asset, position, market, &ctx)?
        } else {
            return Err(VaultError::AssetNotFound(asset.clone()));
        };

        self.valuations.update(asset, usd_value, now_ms)?;
        if let Some(record) = self.operation.as_mut() {
            if record.borrowed_asset_types.contains(asset) {
                record.updated_asset_types.insert(asset.clone());
            }
        }

        self.emit(AssetValueUpdated {
            vault: self.id,
            asset: asset.clone(),
            usd_value,
            timestamp_ms: now_ms,
        });
        debug!(vault = %self.id, asset = %asset, %usd_value, "asset value updated");

        Ok(usd_value)
    }

    fn coin_value(
        &self,
        asset: &AssetType,
        balance: u64,
        decimals: u8,
        now_ms: u64,
        oracle_config: &OracleConfig,
    ) -> Result<U256> {
        if balance == 0 {
            return Ok(U256::zero());
        }
        let price = self.oracle.get_price_with(asset, now_ms, oracle_config)?.price;
        usd_value_of(U256::from(balance), price, decimals)
    }

    /// Check that a held lending position stays above `min_health_factor`
    /// (18 decimals). Returns the computed health factor.
    pub fn verify_lending_health(
        &mut self,
        operator_cap: &OperatorCap,
        asset: &AssetType,
        market: &MarketRef,
        min_health_factor: U256,
        now_ms: u64,
    ) -> Result<U256> {
        self.assert_operator(operator_cap)?;
        require!(
            !self.valuations.is_borrowed(asset),
            VaultError::AssetBorrowed(asset.clone())
        );
        let position = self
            .positions
            .get(asset)
            .ok_or_else(|| VaultError::AssetNotFound(asset.clone()))?;
        require!(
            matches!(position, Position::Lending(_)),
            VaultError::MarketMismatch(asset.clone())
        );

        let (oracle_config, dex_slippage_bps) = self.pricing_params();
        let ctx = ValuationContext {
            oracle: &self.oracle,
            oracle_config: &oracle_config,
            now_ms,
            dex_slippage_bps,
        };
        let breakdown = LendingAdaptor.breakdown(asset, position, market, &ctx)?;
        let health_factor = LendingAdaptor::health_factor(&breakdown)?;
        require!(
            health_factor >= min_health_factor,
            VaultError::HealthFactorTooLow
        );

        self.emit(HealthVerified {
            vault: self.id,
            asset: asset.clone(),
            health_factor,
            min_health_factor,
        });
        debug!(vault = %self.id, asset = %asset, %health_factor, "lending health verified");

        Ok(health_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adaptors::{LendingMarketRef, LendingPosition, LendingReserve},
        instructions::test_support::*,
        math::ratio_unit,
        state::Address,
    };

    fn market_id() -> Address {
        Address::derive(&[b"market"])
    }

    fn lending_position(supplied: u128, borrowed: u128) -> Position {
        Position::Lending(LendingPosition {
            market_id: market_id(),
            reserves: vec![LendingReserve {
                coin_type: sui(),
                decimals: 9,
                supplied,
                accrued_supply_interest: 0,
                borrowed,
                accrued_borrow_interest: 0,
                liquidation_threshold_bps: 8_000,
            }],
        })
    }

    fn market() -> MarketRef {
        MarketRef::Lending(LendingMarketRef {
            market_id: market_id(),
            reserve_coin_types: vec![sui()],
        })
    }

    #[test]
    fn test_update_is_idempotent() {
        let (mut vault, _, operator) = setup(fee_free_config());
        deposit(&mut vault, &operator, user("alice"), 10 * ONE_SUI, T0);

        let first = vault.update_asset_value(&sui(), None, T0 + 5).unwrap();
        let snapshot = vault.valuations.get(&sui()).copied();
        let second = vault.update_asset_value(&sui(), None, T0 + 5).unwrap();

        assert_eq!(first, second);
        assert_eq!(vault.valuations.get(&sui()).copied(), snapshot);
    }

    #[test]
    fn test_position_requires_market() {
        let (mut vault, _, operator) = setup(fee_free_config());
        let navi = AssetType::from("navi-account");
        vault
            .add_position(&operator, navi.clone(), lending_position(ONE_SUI as u128, 0), None, T0)
            .unwrap();

        assert_eq!(
            vault.update_asset_value(&navi, None, T0).unwrap_err(),
            VaultError::MarketMismatch(navi.clone())
        );
        let value = vault.update_asset_value(&navi, Some(&market()), T0).unwrap();
        assert_eq!(value, ratio_unit());
    }

    #[test]
    fn test_unknown_asset_rejected() {
        let (mut vault, _, _) = setup(fee_free_config());
        let ghost = AssetType::from("ghost");
        assert_eq!(
            vault.update_asset_value(&ghost, None, T0).unwrap_err(),
            VaultError::AssetNotFound(ghost)
        );
    }

    #[test]
    fn test_lending_health_verified() {
        let (mut vault, _, operator) = setup(fee_free_config());
        let navi = AssetType::from("navi-account");
        vault
            .add_position(
                &operator,
                navi.clone(),
                lending_position(10 * ONE_SUI as u128, 4 * ONE_SUI as u128),
                None,
                T0,
            )
            .unwrap();

        // 10 × 0.8 / 4 = 2.0
        let hf = vault
            .verify_lending_health(&operator, &navi, &market(), ratio_unit(), T0)
            .unwrap();
        assert_eq!(hf, ratio_unit() * U256::from(2u64));

        assert_eq!(
            vault
                .verify_lending_health(&operator, &navi, &market(), ratio_unit() * U256::from(3u64), T0)
                .unwrap_err(),
            VaultError::HealthFactorTooLow
        );
    }
}
