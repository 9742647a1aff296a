use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    adaptors::{Position, VaultReceiptPosition, VaultRef},
    error::{Result, VaultError},
    events::VaultEvent,
    math::{
        amount_for_usd, apply_bps, mul_div, ratio_unit, shares_for_usd, to_u64, u256_string,
        usd_for_shares, usd_value_of, Rounding, U256,
    },
    oracle::OracleConfig,
    receipt::Receipt,
    record::OperationRecord,
    require,
    requests::{DepositRequest, WithdrawRequest},
    state::{Address, AssetType, CoinHolding, Vault, VaultConfig, VaultStatus},
    valuation::AssetValuation,
};

/// Read-only snapshot for dashboards and the operator API
#[derive(Debug, Clone, Serialize)]
pub struct VaultSummary {
    pub id: Address,
    pub principal: AssetType,
    pub status: VaultStatus,
    #[serde(with = "u256_string")]
    pub total_shares: U256,
    pub free_principal: u64,
    pub deposit_buffer_balance: u64,
    pub collected_fees: u64,
    pub cur_epoch: u64,
    #[serde(with = "u256_string")]
    pub cur_epoch_loss: U256,
    #[serde(with = "u256_string")]
    pub loss_limit: U256,
    pub config: VaultConfig,
    pub oracle_config: OracleConfig,
    pub operation: Option<OperationRecord>,
    pub valuations: BTreeMap<AssetType, AssetValuation>,
    pub coins: BTreeMap<AssetType, CoinHolding>,
    pub positions: BTreeMap<AssetType, Position>,
}

impl Vault {
    pub fn id(&self) -> Address {
        self.id
    }

    pub fn principal(&self) -> &AssetType {
        &self.principal
    }

    pub fn status(&self) -> VaultStatus {
        self.status
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn oracle_config(&self) -> &OracleConfig {
        self.oracle.config()
    }

    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    pub fn free_principal(&self) -> u64 {
        self.free_principal
    }

    pub fn collected_fees(&self) -> u64 {
        self.collected_fees
    }

    pub fn deposit_buffer_balance(&self) -> u64 {
        self.requests.deposit_balance()
    }

    pub fn cur_epoch_loss(&self) -> U256 {
        self.cur_epoch_loss
    }

    /// Loss budget of the current epoch under the live tolerance
    pub fn loss_limit(&self) -> Result<U256> {
        apply_bps(
            self.cur_epoch_loss_base_usd_value,
            self.config.loss_tolerance_bps,
        )
    }

    pub fn operation(&self) -> Option<&OperationRecord> {
        self.operation.as_ref()
    }

    pub fn is_operator_frozen(&self, operator_cap: &Address) -> bool {
        self.frozen_operators.contains(operator_cap)
    }

    pub fn receipt(&self, receipt_id: &Address) -> Result<&Receipt> {
        self.receipts
            .get(receipt_id)
            .ok_or(VaultError::ReceiptNotFound)
    }

    pub fn receipts_of<'a>(&'a self, owner: &'a Address) -> impl Iterator<Item = &'a Receipt> + 'a {
        self.receipts.values().filter(move |r| r.owner == *owner)
    }

    pub fn deposit_request(&self, request_id: u64) -> Result<&DepositRequest> {
        self.requests.deposit(request_id)
    }

    pub fn withdraw_request(&self, request_id: u64) -> Result<&WithdrawRequest> {
        self.requests.withdraw(request_id)
    }

    pub fn pending_deposits(&self) -> impl Iterator<Item = &DepositRequest> {
        self.requests.pending_deposits()
    }

    pub fn pending_withdrawals(&self) -> impl Iterator<Item = &WithdrawRequest> {
        self.requests.pending_withdrawals()
    }

    pub fn valuation(&self, asset: &AssetType) -> Option<&AssetValuation> {
        self.valuations.get(asset)
    }

    pub fn coin(&self, asset: &AssetType) -> Option<&CoinHolding> {
        self.coins.get(asset)
    }

    pub fn position(&self, asset: &AssetType) -> Option<&Position> {
        self.positions.get(asset)
    }

    /// Sum of every asset valuation; fails if any is stale or in custody
    pub fn total_usd_value(&self, now_ms: u64) -> Result<U256> {
        self.valuations
            .total_value(now_ms, self.config.max_update_interval_ms)
    }

    /// USD value per share with 18 decimals; 1.0 while no shares exist
    pub fn share_ratio(&self, now_ms: u64) -> Result<U256> {
        Self::ratio_from(self.total_usd_value(now_ms)?, self.total_shares)
    }

    /// Market reference for valuing receipts of this vault held elsewhere
    pub fn vault_ref(&self, now_ms: u64) -> Result<VaultRef> {
        Ok(VaultRef {
            vault_id: self.id,
            share_ratio: self.share_ratio(now_ms)?,
        })
    }

    /// Snapshot of a receipt as a position another vault can hold
    pub fn receipt_position(&self, receipt_id: &Address) -> Result<VaultReceiptPosition> {
        let receipt = self.receipt(receipt_id)?;
        Ok(VaultReceiptPosition {
            vault_id: self.id,
            receipt_id: receipt.id,
            principal: self.principal.clone(),
            principal_decimals: self.principal_decimals,
            shares: receipt.shares,
            pending_deposit_balance: receipt.pending_deposit_balance,
        })
    }

    pub(crate) fn ratio_from(total_usd: U256, total_shares: U256) -> Result<U256> {
        if total_shares.is_zero() {
            return Ok(ratio_unit());
        }
        require!(!total_usd.is_zero(), VaultError::DegenerateRatio);
        mul_div(total_usd, ratio_unit(), total_shares, Rounding::Floor)
    }

    /// Shares a deposit of `amount` would mint now, at the current fee rate
    pub fn preview_deposit(&self, amount: u64, now_ms: u64) -> Result<U256> {
        let price = self.oracle.get_price(&self.principal, now_ms)?.price;
        let ratio = self.share_ratio(now_ms)?;
        let fee = apply_bps(U256::from(amount), self.config.deposit_fee_bps)?;
        let usd = usd_value_of(U256::from(amount) - fee, price, self.principal_decimals)?;
        shares_for_usd(usd, ratio)
    }

    /// Principal, net of the current withdraw fee, that `shares` redeem now
    pub fn preview_withdraw(&self, shares: U256, now_ms: u64) -> Result<u64> {
        let price = self.oracle.get_price(&self.principal, now_ms)?.price;
        let ratio = self.share_ratio(now_ms)?;
        let usd = usd_for_shares(shares, ratio)?;
        let amount = to_u64(amount_for_usd(usd, price, self.principal_decimals)?)?;
        let fee = to_u64(apply_bps(U256::from(amount), self.config.withdraw_fee_bps)?)?;
        Ok(amount - fee)
    }

    /// Drain events emitted since the last call
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn summary(&self) -> VaultSummary {
        VaultSummary {
            id: self.id,
            principal: self.principal.clone(),
            status: self.status,
            total_shares: self.total_shares,
            free_principal: self.free_principal,
            deposit_buffer_balance: self.requests.deposit_balance(),
            collected_fees: self.collected_fees,
            cur_epoch: self.cur_epoch,
            cur_epoch_loss: self.cur_epoch_loss,
            loss_limit: self.loss_limit().unwrap_or_default(),
            config: self.config.clone(),
            oracle_config: self.oracle.config().clone(),
            operation: self.operation.clone(),
            valuations: self
                .valuations
                .iter()
                .map(|(asset, valuation)| (asset.clone(), *valuation))
                .collect(),
            coins: self.coins.clone(),
            positions: self.positions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::test_support::*;

    #[test]
    fn test_ratio_degenerate_when_value_vanishes() {
        assert_eq!(
            Vault::ratio_from(U256::zero(), U256::one()),
            Err(VaultError::DegenerateRatio)
        );
        assert_eq!(Vault::ratio_from(U256::zero(), U256::zero()), Ok(ratio_unit()));
    }

    #[test]
    fn test_preview_matches_execution() {
        let (mut vault, _, operator) = setup(fee_free_config());
        deposit(&mut vault, &operator, user("alice"), 3 * ONE_SUI, T0);

        let preview = vault.preview_deposit(2 * ONE_SUI, T0).unwrap();
        let (request_id, receipt_id) = vault
            .request_deposit(user("bob"), None, 2 * ONE_SUI, U256::zero(), T0)
            .unwrap();
        let minted = vault
            .execute_deposit(&operator, request_id, U256::MAX, T0)
            .unwrap();
        assert_eq!(preview, minted);

        let shares = vault.receipt(&receipt_id).unwrap().shares;
        assert_eq!(vault.preview_withdraw(shares, T0).unwrap(), 2 * ONE_SUI);
    }

    #[test]
    fn test_take_events_drains() {
        let (mut vault, _, _) = setup(fee_free_config());
        assert!(!vault.take_events().is_empty());
        assert!(vault.take_events().is_empty());
    }

    #[test]
    fn test_summary_serializes() {
        let (vault, _, _) = setup(fee_free_config());
        let json = serde_json::to_value(vault.summary()).unwrap();
        assert_eq!(json["status"], "normal");
        assert_eq!(json["total_shares"], "0");
    }
}
