use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::{
    adaptors::AdaptorRegistry,
    constants::{ADMIN_CAP_SEED, OPERATOR_CAP_SEED, VAULT_SEED},
    error::Result,
    events::{OperatorCapCreated, VaultCreated},
    math::U256,
    oracle::{OracleConfig, OracleGateway},
    requests::RequestBuffer,
    state::{Address, AdminCap, AssetType, OperatorCap, Vault, VaultConfig, VaultStatus},
    valuation::ValuationRegistry,
};

impl Vault {
    /// Create a vault for `principal` and hand back its admin capability.
    ///
    /// The principal is registered in the valuation table with a zero value;
    /// the first `update_asset_value` call prices it.
    pub fn new(
        principal: AssetType,
        principal_decimals: u8,
        config: VaultConfig,
        oracle_config: OracleConfig,
        now_ms: u64,
    ) -> Result<(Self, AdminCap)> {
        config.validate()?;
        let oracle = OracleGateway::new(oracle_config)?;

        let id = Address::derive(&[
            VAULT_SEED,
            principal.as_str().as_bytes(),
            &now_ms.to_le_bytes(),
        ]);
        let admin_cap = AdminCap {
            id: Address::derive(&[ADMIN_CAP_SEED, id.as_ref()]),
            vault_id: id,
        };

        let mut valuations = ValuationRegistry::default();
        valuations.register(&principal, now_ms)?;

        let cur_epoch = now_ms / config.epoch_duration_ms;

        let mut vault = Self {
            id,
            principal: principal.clone(),
            principal_decimals,
            status: VaultStatus::Normal,
            config,
            total_shares: U256::zero(),
            free_principal: 0,
            coins: BTreeMap::new(),
            positions: BTreeMap::new(),
            adaptors: AdaptorRegistry::default(),
            valuations,
            oracle,
            receipts: BTreeMap::new(),
            requests: RequestBuffer::default(),
            operation: None,
            cur_epoch,
            cur_epoch_loss: U256::zero(),
            cur_epoch_loss_base_usd_value: U256::zero(),
            collected_fees: 0,
            frozen_operators: BTreeSet::new(),
            nonce: 0,
            events: Vec::new(),
        };

        vault.emit(VaultCreated {
            vault: id,
            principal: principal.clone(),
            admin_cap: admin_cap.id,
        });
        info!(vault = %id, principal = %principal, "vault created");

        Ok((vault, admin_cap))
    }

    /// Mint a new operator capability bound to this vault
    pub fn create_operator_cap(&mut self, admin_cap: &AdminCap) -> Result<OperatorCap> {
        self.assert_admin(admin_cap)?;

        let nonce = self.next_nonce();
        let cap = OperatorCap {
            id: Address::derive(&[OPERATOR_CAP_SEED, self.id.as_ref(), &nonce.to_le_bytes()]),
            vault_id: self.id,
        };

        self.emit(OperatorCapCreated {
            vault: self.id,
            operator_cap: cap.id,
        });
        info!(vault = %self.id, operator_cap = %cap.id, "operator cap created");

        Ok(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::VaultError, instructions::test_support::*};

    #[test]
    fn test_new_vault_registers_principal() {
        let (vault, admin) =
            Vault::new(sui(), 9, VaultConfig::default(), OracleConfig::default(), T0).unwrap();
        assert_eq!(vault.status(), VaultStatus::Normal);
        assert!(vault.valuations.contains(&sui()));
        assert_eq!(admin.vault_id, vault.id());
    }

    #[test]
    fn test_new_vault_rejects_invalid_config() {
        let config = VaultConfig {
            epoch_duration_ms: 0,
            ..VaultConfig::default()
        };
        assert!(matches!(
            Vault::new(sui(), 9, config, OracleConfig::default(), T0),
            Err(VaultError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_operator_caps_are_distinct() {
        let (mut vault, admin) =
            Vault::new(sui(), 9, VaultConfig::default(), OracleConfig::default(), T0).unwrap();
        let a = vault.create_operator_cap(&admin).unwrap();
        let b = vault.create_operator_cap(&admin).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_foreign_admin_cap_rejected() {
        let (mut vault, _) =
            Vault::new(sui(), 9, VaultConfig::default(), OracleConfig::default(), T0).unwrap();
        let (_, foreign) =
            Vault::new(sui(), 9, VaultConfig::default(), OracleConfig::default(), T0 + 1).unwrap();
        assert_eq!(
            vault.create_operator_cap(&foreign).unwrap_err(),
            VaultError::Unauthorized
        );
    }
}
