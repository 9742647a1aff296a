//! Admin setters. None of them may run while an operation is in flight, so
//! the values an operation snapshotted cannot drift under it.

use tracing::info;

use crate::{
    error::{Result, VaultError},
    events::{
        ConfigUpdated, FeesRetrieved, OperatorFreezeChanged, OracleConfigUpdated,
        VaultStatusChanged,
    },
    oracle::OracleConfig,
    require,
    state::{Address, AdminCap, Vault, VaultConfig, VaultStatus},
};

impl Vault {
    fn apply_config(&mut self, config: VaultConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.emit(ConfigUpdated {
            vault: self.id,
            config: self.config.clone(),
        });
        info!(vault = %self.id, config = ?self.config, "vault config updated");
        Ok(())
    }

    /// Replace the whole vault config
    pub fn set_config(&mut self, admin_cap: &AdminCap, config: VaultConfig) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;
        self.apply_config(config)
    }

    pub fn set_loss_tolerance(&mut self, admin_cap: &AdminCap, loss_tolerance_bps: u32) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;
        let config = VaultConfig {
            loss_tolerance_bps,
            ..self.config.clone()
        };
        self.apply_config(config)
    }

    /// New rates apply to requests created afterwards
    pub fn set_fee_rates(
        &mut self,
        admin_cap: &AdminCap,
        deposit_fee_bps: u32,
        withdraw_fee_bps: u32,
    ) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;
        let config = VaultConfig {
            deposit_fee_bps,
            withdraw_fee_bps,
            ..self.config.clone()
        };
        self.apply_config(config)
    }

    pub fn set_locking_times(
        &mut self,
        admin_cap: &AdminCap,
        withdraw_ms: u64,
        cancel_ms: u64,
    ) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;
        let config = VaultConfig {
            locking_time_for_withdraw_ms: withdraw_ms,
            locking_time_for_cancel_ms: cancel_ms,
            ..self.config.clone()
        };
        self.apply_config(config)
    }

    pub fn set_oracle_config(&mut self, admin_cap: &AdminCap, config: OracleConfig) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;
        self.oracle.set_config(config)?;

        self.emit(OracleConfigUpdated {
            vault: self.id,
            config: self.oracle.config().clone(),
        });
        info!(vault = %self.id, config = ?self.oracle.config(), "oracle config updated");
        Ok(())
    }

    pub fn set_oracle_staleness_window(
        &mut self,
        admin_cap: &AdminCap,
        staleness_window_ms: u64,
    ) -> Result<()> {
        let config = OracleConfig {
            staleness_window_ms,
            ..self.oracle.config().clone()
        };
        self.set_oracle_config(admin_cap, config)
    }

    /// Toggle between `Normal` and `Disabled`
    pub fn set_enabled(&mut self, admin_cap: &AdminCap, enabled: bool) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;

        let status = if enabled {
            VaultStatus::Normal
        } else {
            VaultStatus::Disabled
        };
        if status == self.status {
            return Ok(());
        }
        self.status = status;

        self.emit(VaultStatusChanged {
            vault: self.id,
            status,
        });
        info!(vault = %self.id, ?status, "vault status changed");
        Ok(())
    }

    pub fn set_operator_frozen(
        &mut self,
        admin_cap: &AdminCap,
        operator_cap: Address,
        frozen: bool,
    ) -> Result<()> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;

        if frozen {
            self.frozen_operators.insert(operator_cap);
        } else {
            self.frozen_operators.remove(&operator_cap);
        }

        self.emit(OperatorFreezeChanged {
            vault: self.id,
            operator_cap,
            frozen,
        });
        info!(vault = %self.id, %operator_cap, frozen, "operator freeze changed");
        Ok(())
    }

    /// Withdraw accumulated deposit and withdraw fees
    pub fn retrieve_fees(&mut self, admin_cap: &AdminCap, amount: u64) -> Result<u64> {
        self.assert_admin(admin_cap)?;
        self.assert_not_during_operation()?;
        require!(amount > 0, VaultError::ZeroAmount);
        require!(
            amount <= self.collected_fees,
            VaultError::InsufficientBalance(self.principal.clone())
        );

        self.collected_fees -= amount;

        self.emit(FeesRetrieved {
            vault: self.id,
            amount,
        });
        info!(vault = %self.id, amount, "fees retrieved");
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instructions::test_support::*,
        math::U256,
        record::BorrowRequest,
    };

    #[test]
    fn test_setters_blocked_during_operation() {
        let (mut vault, admin, operator) = setup(fee_free_config());
        deposit(&mut vault, &operator, user("alice"), ONE_SUI, T0);
        vault
            .start_operation(&operator, BorrowRequest::default(), T0)
            .unwrap();

        assert_eq!(
            vault.set_loss_tolerance(&admin, 50).unwrap_err(),
            VaultError::OperationInProgress
        );
        assert_eq!(
            vault.set_enabled(&admin, false).unwrap_err(),
            VaultError::OperationInProgress
        );
        assert_eq!(
            vault.set_oracle_staleness_window(&admin, 1_000).unwrap_err(),
            VaultError::OperationInProgress
        );
    }

    #[test]
    fn test_disabled_vault_refuses_requests() {
        let (mut vault, admin, _) = setup(fee_free_config());
        vault.set_enabled(&admin, false).unwrap();
        assert_eq!(vault.status(), VaultStatus::Disabled);
        assert_eq!(
            vault
                .request_deposit(user("alice"), None, ONE_SUI, U256::zero(), T0)
                .unwrap_err(),
            VaultError::NotNormal
        );

        vault.set_enabled(&admin, true).unwrap();
        assert_eq!(vault.status(), VaultStatus::Normal);
    }

    #[test]
    fn test_staleness_window_bounds() {
        let (mut vault, admin, _) = setup(fee_free_config());
        assert!(matches!(
            vault.set_oracle_staleness_window(&admin, 0),
            Err(VaultError::InvalidConfig(_))
        ));
        vault.set_oracle_staleness_window(&admin, 30_000).unwrap();
        assert_eq!(vault.oracle_config().staleness_window_ms, 30_000);
    }

    #[test]
    fn test_loss_tolerance_above_full_rejected() {
        let (mut vault, admin, _) = setup(fee_free_config());
        assert!(matches!(
            vault.set_loss_tolerance(&admin, 10_001),
            Err(VaultError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_retrieve_fees() {
        let config = VaultConfig {
            deposit_fee_bps: 100,
            ..fee_free_config()
        };
        let (mut vault, admin, operator) = setup(config);
        deposit(&mut vault, &operator, user("alice"), 100 * ONE_SUI, T0);

        assert!(vault.retrieve_fees(&admin, 2 * ONE_SUI).is_err());
        assert_eq!(vault.retrieve_fees(&admin, ONE_SUI).unwrap(), ONE_SUI);
        assert_eq!(vault.collected_fees(), 0);
    }
}
