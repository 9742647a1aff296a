use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VaultError},
    math::{u256_string, U256},
    require,
    state::Address,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Normal,
    PendingWithdraw,
}

/// A depositor's claim on the vault.
///
/// `pending_withdraw_shares <= shares` holds after every mutation; status is
/// derived from the pending amounts and never set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Address,
    pub owner: Address,
    #[serde(with = "u256_string")]
    pub shares: U256,
    #[serde(with = "u256_string")]
    pub pending_withdraw_shares: U256,
    pub pending_deposit_balance: u64,
    pub status: ReceiptStatus,
    pub last_deposit_ms: u64,
}

impl Receipt {
    pub(crate) fn new(id: Address, owner: Address) -> Self {
        Self {
            id,
            owner,
            shares: U256::zero(),
            pending_withdraw_shares: U256::zero(),
            pending_deposit_balance: 0,
            status: ReceiptStatus::Normal,
            last_deposit_ms: 0,
        }
    }

    pub fn withdrawable_shares(&self) -> U256 {
        self.shares.saturating_sub(self.pending_withdraw_shares)
    }

    pub fn has_pending_requests(&self) -> bool {
        self.pending_deposit_balance > 0 || !self.pending_withdraw_shares.is_zero()
    }

    fn refresh_status(&mut self) {
        self.status = if self.pending_withdraw_shares.is_zero() {
            ReceiptStatus::Normal
        } else {
            ReceiptStatus::PendingWithdraw
        };
    }

    pub(crate) fn add_pending_deposit(&mut self, amount: u64) -> Result<()> {
        self.pending_deposit_balance = self
            .pending_deposit_balance
            .checked_add(amount)
            .ok_or(VaultError::MathOverflow)?;
        Ok(())
    }

    pub(crate) fn remove_pending_deposit(&mut self, amount: u64) -> Result<()> {
        self.pending_deposit_balance = self
            .pending_deposit_balance
            .checked_sub(amount)
            .ok_or(VaultError::MathOverflow)?;
        Ok(())
    }

    /// Credit shares from an executed deposit. Pending withdrawals stay intact.
    pub(crate) fn credit_deposit(&mut self, amount: u64, shares: U256, now_ms: u64) -> Result<()> {
        self.remove_pending_deposit(amount)?;
        self.shares = self
            .shares
            .checked_add(shares)
            .ok_or(VaultError::MathOverflow)?;
        self.last_deposit_ms = now_ms;
        self.refresh_status();
        Ok(())
    }

    pub(crate) fn lock_for_withdraw(&mut self, shares: U256) -> Result<()> {
        require!(
            shares <= self.withdrawable_shares(),
            VaultError::InsufficientShares
        );
        self.pending_withdraw_shares = self
            .pending_withdraw_shares
            .checked_add(shares)
            .ok_or(VaultError::MathOverflow)?;
        self.refresh_status();
        Ok(())
    }

    pub(crate) fn unlock_withdraw(&mut self, shares: U256) -> Result<()> {
        self.pending_withdraw_shares = self
            .pending_withdraw_shares
            .checked_sub(shares)
            .ok_or(VaultError::MathOverflow)?;
        self.refresh_status();
        Ok(())
    }

    /// Burn shares that were locked by a withdraw request
    pub(crate) fn burn_withdrawn(&mut self, shares: U256) -> Result<()> {
        require!(
            shares <= self.pending_withdraw_shares && shares <= self.shares,
            VaultError::InsufficientShares
        );
        self.pending_withdraw_shares = self.pending_withdraw_shares - shares;
        self.shares = self.shares - shares;
        self.refresh_status();
        Ok(())
    }
}
