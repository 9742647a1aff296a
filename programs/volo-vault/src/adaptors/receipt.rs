use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VaultError},
    math::{u256_string, usd_for_shares, usd_value_of, U256},
    require,
    state::{Address, AssetType},
};

use super::{MarketRef, Position, PositionAdaptor, ValuationContext};

/// Shares of another vault held through one of its receipts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultReceiptPosition {
    pub vault_id: Address,
    pub receipt_id: Address,
    /// Principal of the referenced vault
    pub principal: AssetType,
    pub principal_decimals: u8,
    #[serde(with = "u256_string")]
    pub shares: U256,
    /// Deposit waiting for execution in the referenced vault
    #[serde(default)]
    pub pending_deposit_balance: u64,
}

/// Current share ratio of the referenced vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRef {
    pub vault_id: Address,
    #[serde(with = "u256_string")]
    pub share_ratio: U256,
}

/// Values a receipt by the referenced vault's share ratio
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptAdaptor;

impl PositionAdaptor for ReceiptAdaptor {
    fn name(&self) -> &'static str {
        "receipt"
    }

    fn value(
        &self,
        asset: &AssetType,
        position: &Position,
        market: &MarketRef,
        ctx: &ValuationContext<'_>,
    ) -> Result<U256> {
        let (Position::Receipt(position), MarketRef::Vault(vault)) = (position, market) else {
            return Err(VaultError::MarketMismatch(asset.clone()));
        };
        require!(
            vault.vault_id == position.vault_id,
            VaultError::MarketMismatch(asset.clone())
        );

        let shares_usd = usd_for_shares(position.shares, vault.share_ratio)?;
        if position.pending_deposit_balance == 0 {
            return Ok(shares_usd);
        }

        let price = ctx.price(&position.principal)?.price;
        let pending_usd = usd_value_of(
            U256::from(position.pending_deposit_balance),
            price,
            position.principal_decimals,
        )?;
        shares_usd
            .checked_add(pending_usd)
            .ok_or(VaultError::MathOverflow)
    }
}
