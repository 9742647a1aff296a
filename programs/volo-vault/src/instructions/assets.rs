//! Registration and removal of held assets. Only allowed while `Normal`.

use std::sync::Arc;

use tracing::info;

use crate::{
    adaptors::{default_adaptor_for, Position, PositionAdaptor},
    error::{Result, VaultError},
    events::{AssetAdded, AssetRemoved},
    require,
    state::{AssetType, CoinHolding, OperatorCap, Vault},
};

impl Vault {
    fn assert_new_asset(&self, asset: &AssetType) -> Result<()> {
        require!(
            *asset != self.principal
                && !self.coins.contains_key(asset)
                && !self.positions.contains_key(asset),
            VaultError::AssetAlreadyExists(asset.clone())
        );
        Ok(())
    }

    /// Track a non-principal coin with an empty balance
    pub fn add_coin_asset(
        &mut self,
        operator_cap: &OperatorCap,
        asset: AssetType,
        decimals: u8,
        now_ms: u64,
    ) -> Result<()> {
        self.assert_operator(operator_cap)?;
        self.assert_normal()?;
        self.assert_new_asset(&asset)?;

        self.valuations.register(&asset, now_ms)?;
        self.coins.insert(
            asset.clone(),
            CoinHolding {
                balance: 0,
                decimals,
            },
        );

        self.emit(AssetAdded {
            vault: self.id,
            asset: asset.clone(),
        });
        info!(vault = %self.id, asset = %asset, "coin asset added");
        Ok(())
    }

    /// Track a DeFi position. Without an explicit adaptor the default one for
    /// the position kind is used. The position starts at zero value until
    /// its first update.
    pub fn add_position(
        &mut self,
        operator_cap: &OperatorCap,
        asset: AssetType,
        position: Position,
        adaptor: Option<Arc<dyn PositionAdaptor>>,
        now_ms: u64,
    ) -> Result<()> {
        self.assert_operator(operator_cap)?;
        self.assert_normal()?;
        self.assert_new_asset(&asset)?;

        let adaptor = adaptor.unwrap_or_else(|| default_adaptor_for(&position));
        self.valuations.register(&asset, now_ms)?;
        info!(
            vault = %self.id,
            asset = %asset,
            adaptor = adaptor.name(),
            "position added"
        );
        self.adaptors.register(&asset, adaptor);
        self.positions.insert(asset.clone(), position);

        self.emit(AssetAdded {
            vault: self.id,
            asset,
        });
        Ok(())
    }

    /// Stop tracking an empty coin or a zero-valued position
    pub fn remove_asset(&mut self, operator_cap: &OperatorCap, asset: &AssetType) -> Result<()> {
        self.assert_operator(operator_cap)?;
        self.assert_normal()?;
        require!(
            *asset != self.principal,
            VaultError::InvalidConfig("principal cannot be removed")
        );

        if let Some(holding) = self.coins.get(asset) {
            require!(holding.balance == 0, VaultError::AssetNotEmpty(asset.clone()));
        } else if self.positions.contains_key(asset) {
            let valuation = self
                .valuations
                .get(asset)
                .ok_or_else(|| VaultError::AssetNotFound(asset.clone()))?;
            require!(
                valuation.usd_value.is_zero(),
                VaultError::AssetNotEmpty(asset.clone())
            );
        } else {
            return Err(VaultError::AssetNotFound(asset.clone()));
        }

        self.valuations.remove(asset)?;
        self.coins.remove(asset);
        self.positions.remove(asset);
        self.adaptors.remove(asset);

        self.emit(AssetRemoved {
            vault: self.id,
            asset: asset.clone(),
        });
        info!(vault = %self.id, asset = %asset, "asset removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instructions::test_support::*,
        math::ratio_unit,
        record::BorrowRequest,
    };

    fn usdc() -> AssetType {
        AssetType::from("0xdba3::usdc::USDC")
    }

    #[test]
    fn test_add_coin_twice_rejected() {
        let (mut vault, _, operator) = setup(fee_free_config());
        vault.add_coin_asset(&operator, usdc(), 6, T0).unwrap();
        assert_eq!(
            vault.add_coin_asset(&operator, usdc(), 6, T0).unwrap_err(),
            VaultError::AssetAlreadyExists(usdc())
        );
        assert_eq!(
            vault.add_coin_asset(&operator, sui(), 9, T0).unwrap_err(),
            VaultError::AssetAlreadyExists(sui())
        );
    }

    #[test]
    fn test_remove_non_empty_coin_rejected() {
        let (mut vault, _, operator) = setup(fee_free_config());
        vault.add_coin_asset(&operator, usdc(), 6, T0).unwrap();
        vault.coins.get_mut(&usdc()).unwrap().balance = 1;
        assert_eq!(
            vault.remove_asset(&operator, &usdc()).unwrap_err(),
            VaultError::AssetNotEmpty(usdc())
        );

        vault.coins.get_mut(&usdc()).unwrap().balance = 0;
        vault.remove_asset(&operator, &usdc()).unwrap();
        assert!(!vault.valuations.contains(&usdc()));
    }

    #[test]
    fn test_asset_changes_blocked_during_operation() {
        let (mut vault, _, operator) = setup(fee_free_config());
        deposit(&mut vault, &operator, user("alice"), ONE_SUI, T0);
        vault
            .start_operation(&operator, BorrowRequest::default(), T0)
            .unwrap();
        assert_eq!(
            vault.add_coin_asset(&operator, usdc(), 6, T0).unwrap_err(),
            VaultError::NotNormal
        );
        assert_eq!(vault.total_shares(), ratio_unit());
    }
}
