//! Operator execution of queued requests against the current share ratio.

use serde::Serialize;
use tracing::info;

use crate::{
    error::{Result, VaultError},
    events::{DepositExecuted, WithdrawExecuted},
    math::{amount_for_usd, apply_bps, shares_for_usd, to_u64, usd_for_shares, usd_value_of, U256},
    require,
    state::{Address, OperatorCap, Vault},
};

/// Principal released by an executed withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawPayout {
    pub request_id: u64,
    pub recipient: Address,
    /// Net amount sent to the recipient
    pub amount: u64,
    pub fee: u64,
}

impl Vault {
    /// Mint shares for a pending deposit.
    ///
    /// Shares are priced at the ratio before the deposit lands, so existing
    /// holders are not diluted. Slippage bounds are `[expected_shares,
    /// max_shares_received]`.
    pub fn execute_deposit(
        &mut self,
        operator_cap: &OperatorCap,
        request_id: u64,
        max_shares_received: U256,
        now_ms: u64,
    ) -> Result<U256> {
        self.assert_operator(operator_cap)?;
        self.assert_normal()?;

        let request = self.requests.deposit(request_id)?.clone();
        let mut receipt = self.receipt(&request.receipt_id)?.clone();
        require!(receipt.owner == request.requester, VaultError::RecipientMismatch);

        // Ratio before the deposit
        let price = self.oracle.get_price(&self.principal, now_ms)?.price;
        let total_usd = self.total_usd_value(now_ms)?;
        let ratio = Self::ratio_from(total_usd, self.total_shares)?;

        // Fee at the rate locked into the request
        let fee = to_u64(apply_bps(U256::from(request.amount), request.fee_bps)?)?;
        let net_amount = request.amount - fee;

        let deposit_usd = usd_value_of(U256::from(net_amount), price, self.principal_decimals)?;
        let shares = shares_for_usd(deposit_usd, ratio)?;
        require!(!shares.is_zero(), VaultError::ZeroShares);

        // Slippage check
        require!(
            shares >= request.expected_shares && shares <= max_shares_received,
            VaultError::SlippageExceeded
        );

        let free_principal = self
            .free_principal
            .checked_add(net_amount)
            .ok_or(VaultError::MathOverflow)?;
        let principal_usd = usd_value_of(U256::from(free_principal), price, self.principal_decimals)?;
        let total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(VaultError::MathOverflow)?;
        let collected_fees = self
            .collected_fees
            .checked_add(fee)
            .ok_or(VaultError::MathOverflow)?;
        receipt.credit_deposit(request.amount, shares, now_ms)?;

        // Commit
        self.requests.take_deposit(request_id)?;
        self.valuations.update(&self.principal, principal_usd, now_ms)?;
        self.free_principal = free_principal;
        self.total_shares = total_shares;
        self.collected_fees = collected_fees;
        self.receipts.insert(receipt.id, receipt);

        self.emit(DepositExecuted {
            vault: self.id,
            request_id,
            receipt_id: request.receipt_id,
            amount: net_amount,
            fee,
            shares,
        });
        info!(
            vault = %self.id,
            request_id,
            amount = net_amount,
            fee,
            %shares,
            "deposit executed"
        );

        Ok(shares)
    }

    /// Burn locked shares and release principal for a pending withdrawal.
    ///
    /// The amount is checked post-fee against `expected_amount` and pre-fee
    /// against `max_amount_received`.
    pub fn execute_withdraw(
        &mut self,
        operator_cap: &OperatorCap,
        request_id: u64,
        max_amount_received: u64,
        now_ms: u64,
    ) -> Result<WithdrawPayout> {
        self.assert_operator(operator_cap)?;
        self.assert_normal()?;

        let request = self.requests.withdraw(request_id)?.clone();
        let mut receipt = self.receipt(&request.receipt_id)?.clone();
        require!(receipt.owner == request.requester, VaultError::RecipientMismatch);

        let price = self.oracle.get_price(&self.principal, now_ms)?.price;
        let total_usd = self.total_usd_value(now_ms)?;
        let ratio = Self::ratio_from(total_usd, self.total_shares)?;

        let usd = usd_for_shares(request.shares, ratio)?;
        let amount = to_u64(amount_for_usd(usd, price, self.principal_decimals)?)?;
        require!(amount > 0, VaultError::ZeroAmount);

        let fee = to_u64(apply_bps(U256::from(amount), request.fee_bps)?)?;
        let net_amount = amount - fee;

        // Slippage check
        require!(
            net_amount >= request.expected_amount && amount <= max_amount_received,
            VaultError::SlippageExceeded
        );
        require!(amount <= self.free_principal, VaultError::InsufficientPrincipal);

        let free_principal = self.free_principal - amount;
        let principal_usd = usd_value_of(U256::from(free_principal), price, self.principal_decimals)?;
        let total_shares = self
            .total_shares
            .checked_sub(request.shares)
            .ok_or(VaultError::InsufficientShares)?;
        let collected_fees = self
            .collected_fees
            .checked_add(fee)
            .ok_or(VaultError::MathOverflow)?;
        receipt.burn_withdrawn(request.shares)?;

        // Commit
        self.requests.take_withdraw(request_id)?;
        self.valuations.update(&self.principal, principal_usd, now_ms)?;
        self.free_principal = free_principal;
        self.total_shares = total_shares;
        self.collected_fees = collected_fees;
        self.receipts.insert(receipt.id, receipt);

        self.emit(WithdrawExecuted {
            vault: self.id,
            request_id,
            receipt_id: request.receipt_id,
            recipient: request.requester,
            shares: request.shares,
            amount: net_amount,
            fee,
        });
        info!(
            vault = %self.id,
            request_id,
            amount = net_amount,
            fee,
            shares = %request.shares,
            "withdraw executed"
        );

        Ok(WithdrawPayout {
            request_id,
            recipient: request.requester,
            amount: net_amount,
            fee,
        })
    }
}
