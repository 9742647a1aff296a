//! Request buffer: user deposit/withdraw intents awaiting operator execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VaultError},
    math::{u256_string, U256},
    state::Address,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub request_id: u64,
    pub receipt_id: Address,
    pub requester: Address,
    pub amount: u64,
    #[serde(with = "u256_string")]
    pub expected_shares: U256,
    /// Deposit fee rate locked when the request was created
    pub fee_bps: u32,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub request_id: u64,
    pub receipt_id: Address,
    pub requester: Address,
    #[serde(with = "u256_string")]
    pub shares: U256,
    /// Minimum principal received after fees
    pub expected_amount: u64,
    /// Withdraw fee rate locked when the request was created
    pub fee_bps: u32,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RequestBuffer {
    next_id: u64,
    deposits: BTreeMap<u64, DepositRequest>,
    withdrawals: BTreeMap<u64, WithdrawRequest>,
    /// Principal escrowed by pending deposit requests
    deposit_balance: u64,
}

impl RequestBuffer {
    pub(crate) fn next_request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn push_deposit(&mut self, request: DepositRequest) -> Result<()> {
        self.deposit_balance = self
            .deposit_balance
            .checked_add(request.amount)
            .ok_or(VaultError::MathOverflow)?;
        self.deposits.insert(request.request_id, request);
        Ok(())
    }

    pub(crate) fn take_deposit(&mut self, request_id: u64) -> Result<DepositRequest> {
        let request = self
            .deposits
            .remove(&request_id)
            .ok_or(VaultError::RequestNotFound(request_id))?;
        self.deposit_balance -= request.amount;
        Ok(request)
    }

    pub(crate) fn push_withdraw(&mut self, request: WithdrawRequest) {
        self.withdrawals.insert(request.request_id, request);
    }

    pub(crate) fn take_withdraw(&mut self, request_id: u64) -> Result<WithdrawRequest> {
        self.withdrawals
            .remove(&request_id)
            .ok_or(VaultError::RequestNotFound(request_id))
    }

    pub fn deposit(&self, request_id: u64) -> Result<&DepositRequest> {
        self.deposits
            .get(&request_id)
            .ok_or(VaultError::RequestNotFound(request_id))
    }

    pub fn withdraw(&self, request_id: u64) -> Result<&WithdrawRequest> {
        self.withdrawals
            .get(&request_id)
            .ok_or(VaultError::RequestNotFound(request_id))
    }

    pub fn pending_deposits(&self) -> impl Iterator<Item = &DepositRequest> {
        self.deposits.values()
    }

    pub fn pending_withdrawals(&self) -> impl Iterator<Item = &WithdrawRequest> {
        self.withdrawals.values()
    }

    pub fn deposit_balance(&self) -> u64 {
        self.deposit_balance
    }
}
