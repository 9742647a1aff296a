//! User surface: queue and cancel deposit/withdraw requests, move receipts.

use tracing::{debug, info};

use crate::{
    constants::RECEIPT_SEED,
    error::{Result, VaultError},
    events::{
        DepositCancelled, DepositRequested, ReceiptTransferred, WithdrawCancelled,
        WithdrawRequested,
    },
    math::U256,
    receipt::Receipt,
    require,
    requests::{DepositRequest, WithdrawRequest},
    state::{Address, Vault},
};

impl Vault {
    /// Escrow `amount` of principal and queue a deposit.
    ///
    /// Without `receipt_id` a fresh receipt is opened for `requester`.
    /// Returns `(request_id, receipt_id)`.
    pub fn request_deposit(
        &mut self,
        requester: Address,
        receipt_id: Option<Address>,
        amount: u64,
        expected_shares: U256,
        now_ms: u64,
    ) -> Result<(u64, Address)> {
        self.assert_normal()?;
        require!(amount > 0, VaultError::ZeroAmount);

        let mut receipt = match receipt_id {
            Some(id) => {
                let receipt = self.receipt(&id)?;
                require!(receipt.owner == requester, VaultError::Unauthorized);
                receipt.clone()
            }
            None => {
                let nonce = self.next_nonce();
                let id = Address::derive(&[RECEIPT_SEED, self.id.as_ref(), &nonce.to_le_bytes()]);
                Receipt::new(id, requester)
            }
        };
        receipt.add_pending_deposit(amount)?;

        let request_id = self.requests.next_request_id();
        let request = DepositRequest {
            request_id,
            receipt_id: receipt.id,
            requester,
            amount,
            expected_shares,
            fee_bps: self.config.deposit_fee_bps,
            created_at_ms: now_ms,
        };
        self.requests.push_deposit(request)?;

        let receipt_id = receipt.id;
        self.receipts.insert(receipt_id, receipt);

        self.emit(DepositRequested {
            vault: self.id,
            request_id,
            receipt_id,
            requester,
            amount,
            expected_shares,
        });
        info!(vault = %self.id, request_id, %receipt_id, amount, "deposit requested");

        Ok((request_id, receipt_id))
    }

    /// Refund an unexecuted deposit. Only the requester may cancel, and only
    /// after the cancel lock has elapsed.
    pub fn cancel_deposit(&mut self, caller: Address, request_id: u64, now_ms: u64) -> Result<u64> {
        self.assert_normal()?;

        let request = self.requests.deposit(request_id)?;
        require!(caller == request.requester, VaultError::Unauthorized);
        require!(
            now_ms >= request
                .created_at_ms
                .saturating_add(self.config.locking_time_for_cancel_ms),
            VaultError::RequestLocked
        );

        let mut receipt = self.receipt(&request.receipt_id)?.clone();
        require!(receipt.owner == request.requester, VaultError::RecipientMismatch);
        receipt.remove_pending_deposit(request.amount)?;

        // Commit
        let request = self.requests.take_deposit(request_id)?;
        self.receipts.insert(receipt.id, receipt);

        self.emit(DepositCancelled {
            vault: self.id,
            request_id,
            receipt_id: request.receipt_id,
            requester: request.requester,
            amount: request.amount,
        });
        info!(vault = %self.id, request_id, amount = request.amount, "deposit cancelled");

        Ok(request.amount)
    }

    /// Lock `shares` of a receipt and queue a withdrawal.
    ///
    /// `expected_amount` is the minimum principal received after fees.
    pub fn request_withdraw(
        &mut self,
        caller: Address,
        receipt_id: Address,
        shares: U256,
        expected_amount: u64,
        now_ms: u64,
    ) -> Result<u64> {
        self.assert_normal()?;
        require!(!shares.is_zero(), VaultError::ZeroAmount);

        let mut receipt = self.receipt(&receipt_id)?.clone();
        require!(receipt.owner == caller, VaultError::Unauthorized);
        require!(
            now_ms >= receipt
                .last_deposit_ms
                .saturating_add(self.config.locking_time_for_withdraw_ms),
            VaultError::WithdrawLocked
        );
        receipt.lock_for_withdraw(shares)?;

        let request_id = self.requests.next_request_id();
        self.requests.push_withdraw(WithdrawRequest {
            request_id,
            receipt_id,
            requester: caller,
            shares,
            expected_amount,
            fee_bps: self.config.withdraw_fee_bps,
            created_at_ms: now_ms,
        });
        self.receipts.insert(receipt_id, receipt);

        self.emit(WithdrawRequested {
            vault: self.id,
            request_id,
            receipt_id,
            requester: caller,
            shares,
            expected_amount,
        });
        info!(vault = %self.id, request_id, %receipt_id, %shares, "withdraw requested");

        Ok(request_id)
    }

    /// Release the shares locked by an unexecuted withdrawal
    pub fn cancel_withdraw(&mut self, caller: Address, request_id: u64, now_ms: u64) -> Result<U256> {
        self.assert_normal()?;

        let request = self.requests.withdraw(request_id)?;
        require!(caller == request.requester, VaultError::Unauthorized);
        require!(
            now_ms >= request
                .created_at_ms
                .saturating_add(self.config.locking_time_for_cancel_ms),
            VaultError::RequestLocked
        );

        let mut receipt = self.receipt(&request.receipt_id)?.clone();
        require!(receipt.owner == request.requester, VaultError::RecipientMismatch);
        receipt.unlock_withdraw(request.shares)?;

        // Commit
        let request = self.requests.take_withdraw(request_id)?;
        self.receipts.insert(receipt.id, receipt);

        self.emit(WithdrawCancelled {
            vault: self.id,
            request_id,
            receipt_id: request.receipt_id,
            requester: request.requester,
            shares: request.shares,
        });
        info!(vault = %self.id, request_id, shares = %request.shares, "withdraw cancelled");

        Ok(request.shares)
    }

    /// Hand a receipt to another owner. Refused while it backs pending requests.
    pub fn transfer_receipt(
        &mut self,
        caller: Address,
        receipt_id: Address,
        new_owner: Address,
    ) -> Result<()> {
        let receipt = self.receipt(&receipt_id)?;
        require!(receipt.owner == caller, VaultError::Unauthorized);
        require!(!receipt.has_pending_requests(), VaultError::ReceiptBusy);

        if let Some(receipt) = self.receipts.get_mut(&receipt_id) {
            receipt.owner = new_owner;
        }

        self.emit(ReceiptTransferred {
            vault: self.id,
            receipt_id,
            previous_owner: caller,
            new_owner,
        });
        debug!(vault = %self.id, %receipt_id, %new_owner, "receipt transferred");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instructions::test_support::*,
        receipt::ReceiptStatus,
        state::VaultConfig,
    };

    #[test]
    fn test_request_deposit_zero_amount_rejected() {
        let (mut vault, _, _) = setup(fee_free_config());
        assert_eq!(
            vault
                .request_deposit(user("alice"), None, 0, U256::zero(), T0)
                .unwrap_err(),
            VaultError::ZeroAmount
        );
    }

    #[test]
    fn test_request_deposit_escrows_in_buffer() {
        let (mut vault, _, _) = setup(fee_free_config());
        let (request_id, receipt_id) = vault
            .request_deposit(user("alice"), None, 5 * ONE_SUI, U256::zero(), T0)
            .unwrap();

        assert_eq!(vault.requests.deposit_balance(), 5 * ONE_SUI);
        assert_eq!(vault.free_principal(), 0);
        assert_eq!(vault.total_shares(), U256::zero());
        let receipt = vault.receipt(&receipt_id).unwrap();
        assert_eq!(receipt.pending_deposit_balance, 5 * ONE_SUI);
        assert_eq!(vault.deposit_request(request_id).unwrap().fee_bps, 0);
    }

    #[test]
    fn test_cancel_deposit_restores_state() {
        let (mut vault, _, _) = setup(fee_free_config());
        let alice = user("alice");
        let (request_id, receipt_id) = vault
            .request_deposit(alice, None, 7 * ONE_SUI, U256::zero(), T0)
            .unwrap();

        let refunded = vault.cancel_deposit(alice, request_id, T0).unwrap();

        assert_eq!(refunded, 7 * ONE_SUI);
        assert_eq!(vault.requests.deposit_balance(), 0);
        assert_eq!(vault.total_shares(), U256::zero());
        assert_eq!(vault.free_principal(), 0);
        assert_eq!(vault.receipt(&receipt_id).unwrap().pending_deposit_balance, 0);
        assert!(vault.deposit_request(request_id).is_err());
    }

    #[test]
    fn test_cancel_deposit_by_stranger_rejected() {
        let (mut vault, _, _) = setup(fee_free_config());
        let (request_id, _) = vault
            .request_deposit(user("alice"), None, ONE_SUI, U256::zero(), T0)
            .unwrap();
        assert_eq!(
            vault.cancel_deposit(user("mallory"), request_id, T0).unwrap_err(),
            VaultError::Unauthorized
        );
    }

    #[test]
    fn test_cancel_respects_locking_window() {
        let config = VaultConfig {
            locking_time_for_cancel_ms: 1_000,
            ..fee_free_config()
        };
        let (mut vault, _, _) = setup(config);
        let alice = user("alice");
        let (request_id, _) = vault
            .request_deposit(alice, None, ONE_SUI, U256::zero(), T0)
            .unwrap();

        let err = vault.cancel_deposit(alice, request_id, T0 + 999).unwrap_err();
        assert_eq!(err, VaultError::RequestLocked);
        assert!(err.is_retryable());
        assert!(vault.cancel_deposit(alice, request_id, T0 + 1_000).is_ok());
    }

    #[test]
    fn test_withdraw_locked_after_deposit() {
        let config = VaultConfig {
            locking_time_for_withdraw_ms: 10_000,
            ..fee_free_config()
        };
        let (mut vault, _, operator) = setup(config);
        let alice = user("alice");
        let receipt_id = deposit(&mut vault, &operator, alice, ONE_SUI, T0);

        assert_eq!(
            vault
                .request_withdraw(alice, receipt_id, U256::one(), 0, T0 + 9_999)
                .unwrap_err(),
            VaultError::WithdrawLocked
        );
        assert!(vault
            .request_withdraw(alice, receipt_id, U256::one(), 0, T0 + 10_000)
            .is_ok());
    }

    #[test]
    fn test_withdraw_cannot_exceed_receipt_shares() {
        let (mut vault, _, operator) = setup(fee_free_config());
        let alice = user("alice");
        let receipt_id = deposit(&mut vault, &operator, alice, ONE_SUI, T0);
        let shares = vault.receipt(&receipt_id).unwrap().shares;

        vault
            .request_withdraw(alice, receipt_id, shares, 0, T0)
            .unwrap();
        assert_eq!(
            vault
                .request_withdraw(alice, receipt_id, U256::one(), 0, T0)
                .unwrap_err(),
            VaultError::InsufficientShares
        );
    }

    #[test]
    fn test_cancel_withdraw_unlocks_shares() {
        let (mut vault, _, operator) = setup(fee_free_config());
        let alice = user("alice");
        let receipt_id = deposit(&mut vault, &operator, alice, ONE_SUI, T0);
        let shares = vault.receipt(&receipt_id).unwrap().shares;

        let request_id = vault
            .request_withdraw(alice, receipt_id, shares, 0, T0)
            .unwrap();
        assert_eq!(
            vault.receipt(&receipt_id).unwrap().status,
            ReceiptStatus::PendingWithdraw
        );

        assert_eq!(vault.cancel_withdraw(alice, request_id, T0).unwrap(), shares);
        let receipt = vault.receipt(&receipt_id).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Normal);
        assert_eq!(receipt.withdrawable_shares(), shares);
    }

    #[test]
    fn test_transfer_receipt_blocked_while_pending() {
        let (mut vault, _, _) = setup(fee_free_config());
        let alice = user("alice");
        let (request_id, receipt_id) = vault
            .request_deposit(alice, None, ONE_SUI, U256::zero(), T0)
            .unwrap();

        assert_eq!(
            vault
                .transfer_receipt(alice, receipt_id, user("bob"))
                .unwrap_err(),
            VaultError::ReceiptBusy
        );

        vault.cancel_deposit(alice, request_id, T0).unwrap();
        vault.transfer_receipt(alice, receipt_id, user("bob")).unwrap();
        assert_eq!(vault.receipt(&receipt_id).unwrap().owner, user("bob"));
    }

    #[test]
    fn test_deposit_into_foreign_receipt_rejected() {
        let (mut vault, _, operator) = setup(fee_free_config());
        let receipt_id = deposit(&mut vault, &operator, user("alice"), ONE_SUI, T0);
        assert_eq!(
            vault
                .request_deposit(user("bob"), Some(receipt_id), ONE_SUI, U256::zero(), T0)
                .unwrap_err(),
            VaultError::Unauthorized
        );
    }
}
