//! Operation coordinator.
//!
//! An operation moves assets out to the operator, takes them back, waits for
//! every borrowed asset to be revalued, then reconciles the vault value
//! against the snapshot taken at start. The per-epoch loss budget is
//! `cur_epoch_loss_base_usd_value × loss_tolerance_bps / 10_000`; a loss equal
//! to the remaining budget passes.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::{Result, VaultError},
    events::{
        AssetsReturned, EmergencyRecovery, LossToleranceReset, OperationCompleted,
        OperationStarted, ReconciliationRejected,
    },
    math::{apply_bps, mul_div, u256_string, Rounding, U256},
    record::{BorrowRequest, ConfigSnapshot, Custody, OperationRecord},
    require,
    state::{AdminCap, AssetType, OperatorCap, Vault, VaultStatus},
};

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    #[serde(with = "u256_string")]
    pub usd_value_before: U256,
    #[serde(with = "u256_string")]
    pub usd_value_after: U256,
    #[serde(with = "u256_string")]
    pub loss: U256,
    #[serde(with = "u256_string")]
    pub cur_epoch_loss: U256,
    #[serde(with = "u256_string")]
    pub loss_limit: U256,
}

impl Vault {
    fn operation_record(&self) -> Result<&OperationRecord> {
        require!(
            self.status == VaultStatus::DuringOperation,
            VaultError::NotDuringOperation
        );
        self.operation.as_ref().ok_or(VaultError::NotDuringOperation)
    }

    /// Borrow assets for an operation.
    ///
    /// Every valuation must be fresh: the start snapshot is the reference
    /// value reconciliation compares against.
    pub fn start_operation(
        &mut self,
        operator_cap: &OperatorCap,
        borrow: BorrowRequest,
        now_ms: u64,
    ) -> Result<Custody> {
        self.assert_operator(operator_cap)?;
        self.assert_normal()?;

        let usd_value_before = self.total_usd_value(now_ms)?;

        // Validate every borrow before moving anything
        require!(
            borrow.principal_amount <= self.free_principal,
            VaultError::InsufficientPrincipal
        );
        for (coin, amount) in &borrow.coins {
            let holding = self
                .coins
                .get(coin)
                .ok_or_else(|| VaultError::AssetNotFound(coin.clone()))?;
            require!(*amount > 0, VaultError::ZeroAmount);
            require!(
                holding.balance >= *amount,
                VaultError::InsufficientBalance(coin.clone())
            );
        }
        let mut position_set = BTreeSet::new();
        for asset in &borrow.positions {
            require!(
                self.positions.contains_key(asset),
                VaultError::AssetNotFound(asset.clone())
            );
            require!(
                position_set.insert(asset.clone()),
                VaultError::AssetAlreadyExists(asset.clone())
            );
        }

        let mut borrowed = BTreeSet::new();
        if borrow.principal_amount > 0 {
            borrowed.insert(self.principal.clone());
        }
        borrowed.extend(borrow.coins.keys().cloned());
        borrowed.extend(position_set.iter().cloned());

        let mut borrowed_fungible_usd_value = self.borrowed_share_value(
            &self.principal,
            borrow.principal_amount,
            self.free_principal,
        )?;
        for (coin, amount) in &borrow.coins {
            let balance = self.coins.get(coin).map_or(0, |holding| holding.balance);
            let value = self.borrowed_share_value(coin, *amount, balance)?;
            borrowed_fungible_usd_value = borrowed_fungible_usd_value
                .checked_add(value)
                .ok_or(VaultError::MathOverflow)?;
        }

        // Epoch rollover resets the loss budget to the current vault value
        let epoch = self.epoch_of(now_ms);
        if epoch > self.cur_epoch || self.cur_epoch_loss_base_usd_value.is_zero() {
            self.cur_epoch = epoch;
            self.cur_epoch_loss = U256::zero();
            self.cur_epoch_loss_base_usd_value = usd_value_before;
            self.emit(LossToleranceReset {
                vault: self.id,
                epoch,
                base_usd_value: usd_value_before,
            });
            info!(vault = %self.id, epoch, base = %usd_value_before, "loss tolerance reset");
        }

        // Move assets into custody
        let mut custody = Custody {
            principal: borrow.principal_amount,
            ..Custody::default()
        };
        self.free_principal -= borrow.principal_amount;
        for (coin, amount) in borrow.coins {
            if let Some(holding) = self.coins.get_mut(&coin) {
                holding.balance -= amount;
            }
            custody.coins.insert(coin, amount);
        }
        let mut borrowed_positions = BTreeMap::new();
        for asset in position_set {
            if let Some(position) = self.positions.remove(&asset) {
                borrowed_positions.insert(asset.clone(), position.clone());
                custody.positions.insert(asset, position);
            }
        }
        for asset in &borrowed {
            self.valuations.mark_borrowed(asset);
        }

        self.operation = Some(OperationRecord {
            operator_cap: operator_cap.id(),
            borrowed_asset_types: borrowed.clone(),
            updated_asset_types: BTreeSet::new(),
            value_update_enabled: false,
            usd_value_snapshot: usd_value_before,
            shares_snapshot: self.total_shares,
            started_at_ms: now_ms,
            config: ConfigSnapshot {
                vault: self.config.clone(),
                oracle: self.oracle.config().clone(),
            },
            borrowed_positions,
            borrowed_fungible_usd_value,
        });
        self.status = VaultStatus::DuringOperation;

        self.emit(OperationStarted {
            vault: self.id,
            operator_cap: operator_cap.id(),
            borrowed: borrowed.into_iter().collect(),
            usd_value_before,
            shares_before: self.total_shares,
            started_at_ms: now_ms,
        });
        info!(
            vault = %self.id,
            operator_cap = %operator_cap.id(),
            usd_value_before = %usd_value_before,
            "operation started"
        );

        Ok(custody)
    }

    /// Start-of-operation value of `amount` out of a `balance` valued by
    /// `asset`'s entry. Rounds up so recovery never under-charges.
    fn borrowed_share_value(&self, asset: &AssetType, amount: u64, balance: u64) -> Result<U256> {
        if amount == 0 || balance == 0 {
            return Ok(U256::zero());
        }
        let valuation = self
            .valuations
            .get(asset)
            .ok_or_else(|| VaultError::AssetNotFound(asset.clone()))?;
        mul_div(
            valuation.usd_value,
            U256::from(amount),
            U256::from(balance),
            Rounding::Ceiling,
        )
    }

    /// Take borrowed assets back. Every borrowed asset must be present and
    /// nothing else may be. Positions come back as updated snapshots of the
    /// same external position they were borrowed as.
    pub fn end_operation_returns(
        &mut self,
        operator_cap: &OperatorCap,
        custody: Custody,
        now_ms: u64,
    ) -> Result<()> {
        self.assert_operator(operator_cap)?;
        let record = self.operation_record()?;
        require!(!record.value_update_enabled, VaultError::AssetsAlreadyReturned);

        let borrowed = &record.borrowed_asset_types;

        // Nothing that was not borrowed
        if custody.principal > 0 {
            require!(
                borrowed.contains(&self.principal),
                VaultError::UnexpectedAsset(self.principal.clone())
            );
        }
        for coin in custody.coins.keys() {
            require!(
                borrowed.contains(coin) && self.coins.contains_key(coin),
                VaultError::UnexpectedAsset(coin.clone())
            );
        }
        for (asset, position) in &custody.positions {
            require!(
                borrowed.contains(asset)
                    && *asset != self.principal
                    && !self.coins.contains_key(asset),
                VaultError::UnexpectedAsset(asset.clone())
            );
            let original = record
                .borrowed_positions
                .get(asset)
                .ok_or_else(|| VaultError::UnexpectedAsset(asset.clone()))?;
            require!(
                original.same_identity(position),
                VaultError::MarketMismatch(asset.clone())
            );
        }

        // Everything that was borrowed. Principal is fungible, so a zero
        // return still counts as returned and shows up as a loss.
        for asset in borrowed {
            if *asset == self.principal {
                continue;
            }
            let present = if self.coins.contains_key(asset) {
                custody.coins.contains_key(asset)
            } else {
                custody.positions.contains_key(asset)
            };
            require!(present, VaultError::AssetNotReturned(asset.clone()));
        }

        let free_principal = self
            .free_principal
            .checked_add(custody.principal)
            .ok_or(VaultError::MathOverflow)?;
        let mut coin_balances = BTreeMap::new();
        for (coin, amount) in &custody.coins {
            let balance = self
                .coins
                .get(coin)
                .ok_or_else(|| VaultError::UnexpectedAsset(coin.clone()))?
                .balance
                .checked_add(*amount)
                .ok_or(VaultError::MathOverflow)?;
            coin_balances.insert(coin.clone(), balance);
        }
        let returned: Vec<AssetType> = borrowed.iter().cloned().collect();

        // Commit
        self.free_principal = free_principal;
        for (coin, balance) in coin_balances {
            if let Some(holding) = self.coins.get_mut(&coin) {
                holding.balance = balance;
            }
        }
        self.positions.extend(custody.positions);
        for asset in &returned {
            self.valuations.mark_returned(asset);
        }
        if let Some(record) = self.operation.as_mut() {
            record.value_update_enabled = true;
        }

        self.emit(AssetsReturned {
            vault: self.id,
            returned: returned.clone(),
        });
        info!(
            vault = %self.id,
            returned = returned.len(),
            at_ms = now_ms,
            "operation assets returned"
        );

        Ok(())
    }

    /// Close the operation if every borrowed asset was revalued, the share
    /// count is unchanged and the epoch loss stays within tolerance.
    ///
    /// On rejection the vault stays `DuringOperation` and a
    /// [`ReconciliationRejected`] event records the reason.
    pub fn end_operation_reconcile(
        &mut self,
        operator_cap: &OperatorCap,
        now_ms: u64,
    ) -> Result<OperationSummary> {
        self.assert_operator(operator_cap)?;
        self.operation_record()?;

        let summary = match self.check_reconciliation(now_ms) {
            Ok(summary) => summary,
            Err(err) => {
                self.emit(ReconciliationRejected {
                    vault: self.id,
                    reason: err.to_string(),
                });
                warn!(vault = %self.id, error = %err, "reconciliation rejected");
                return Err(err);
            }
        };

        // Commit
        self.cur_epoch_loss = summary.cur_epoch_loss;
        self.operation = None;
        self.status = VaultStatus::Normal;

        self.emit(OperationCompleted {
            vault: self.id,
            usd_value_before: summary.usd_value_before,
            usd_value_after: summary.usd_value_after,
            loss: summary.loss,
            cur_epoch_loss: summary.cur_epoch_loss,
            loss_limit: summary.loss_limit,
        });
        info!(
            vault = %self.id,
            before = %summary.usd_value_before,
            after = %summary.usd_value_after,
            loss = %summary.loss,
            "operation completed"
        );

        Ok(summary)
    }

    fn check_reconciliation(&self, now_ms: u64) -> Result<OperationSummary> {
        let record = self.operation_record()?;
        require!(record.value_update_enabled, VaultError::AssetsNotReturned);

        if let Some(missing) = record.missing_updates().into_iter().next() {
            return Err(VaultError::IncompleteValueUpdate(missing));
        }

        let usd_value_after = self
            .valuations
            .total_value(now_ms, record.config.vault.max_update_interval_ms)?;
        require!(
            self.total_shares == record.shares_snapshot,
            VaultError::ShareCountMismatch
        );

        let usd_value_before = record.usd_value_snapshot;
        let loss = usd_value_before.saturating_sub(usd_value_after);
        let cur_epoch_loss = self
            .cur_epoch_loss
            .checked_add(loss)
            .ok_or(VaultError::MathOverflow)?;
        let loss_limit = apply_bps(
            self.cur_epoch_loss_base_usd_value,
            record.config.vault.loss_tolerance_bps,
        )?;
        require!(cur_epoch_loss <= loss_limit, VaultError::LossToleranceExceeded);

        Ok(OperationSummary {
            usd_value_before,
            usd_value_after,
            loss,
            cur_epoch_loss,
            loss_limit,
        })
    }

    /// Admin escape hatch for a stuck operation.
    ///
    /// After `min_recovery_delay_ms` the vault returns to `Normal`. Positions
    /// still in custody are written off; principal and coin valuations that
    /// were not refreshed are invalidated so the next total-value read forces
    /// a revaluation.
    ///
    /// Only value known to be gone is charged to the current epoch: the
    /// start value of unreturned principal and coins, written-off positions,
    /// and any shortfall already revealed by a refreshed valuation. Returned
    /// assets awaiting revaluation keep their last recorded value and are
    /// listed as `not_updated` in the event.
    pub fn force_recover(&mut self, admin_cap: &AdminCap, now_ms: u64) -> Result<()> {
        self.assert_admin(admin_cap)?;
        let record = self.operation_record()?.clone();

        let elapsed = now_ms.saturating_sub(record.started_at_ms);
        require!(
            elapsed >= record.config.vault.min_recovery_delay_ms,
            VaultError::RecoveryTooEarly
        );

        let borrowed: Vec<AssetType> = record.borrowed_asset_types.iter().cloned().collect();
        let unreturned: Vec<AssetType> = if record.value_update_enabled {
            Vec::new()
        } else {
            borrowed.clone()
        };
        let not_updated = record.missing_updates();

        for asset in &unreturned {
            if *asset == self.principal || self.coins.contains_key(asset) {
                self.valuations.mark_returned(asset);
                self.valuations.invalidate(asset);
            } else {
                // Position still held by the operator
                self.valuations.write_off(asset);
                self.adaptors.remove(asset);
            }
        }
        for asset in &not_updated {
            self.valuations.invalidate(asset);
        }

        let unreturned_fungible = if record.value_update_enabled {
            U256::zero()
        } else {
            record.borrowed_fungible_usd_value
        };
        let usd_value_after = self
            .valuations
            .recorded_total()
            .saturating_sub(unreturned_fungible);
        let loss = record.usd_value_snapshot.saturating_sub(usd_value_after);
        self.cur_epoch_loss = self.cur_epoch_loss.saturating_add(loss);
        self.operation = None;
        self.status = VaultStatus::Normal;

        self.emit(EmergencyRecovery {
            vault: self.id,
            admin_cap: admin_cap.id(),
            started_at_ms: record.started_at_ms,
            recovered_at_ms: now_ms,
            usd_value_before: record.usd_value_snapshot,
            usd_value_after,
            loss,
            shares_before: record.shares_snapshot,
            shares_after: self.total_shares,
            borrowed,
            unreturned: unreturned.clone(),
            not_updated: not_updated.clone(),
        });
        warn!(
            vault = %self.id,
            unreturned = unreturned.len(),
            not_updated = not_updated.len(),
            %loss,
            "operation force-recovered"
        );

        Ok(())
    }
}
