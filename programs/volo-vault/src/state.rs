use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{
    adaptors::{AdaptorRegistry, Position},
    constants::*,
    error::{Result, VaultError},
    events::VaultEvent,
    math::U256,
    oracle::OracleGateway,
    receipt::Receipt,
    record::OperationRecord,
    require,
    requests::RequestBuffer,
    valuation::ValuationRegistry,
};

/// 32-byte identity of vaults, receipts, capabilities and users (base58 encoded)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic address derived from seeds
    pub fn derive(seeds: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for seed in seeds {
            hasher.update(&(seed.len() as u32).to_le_bytes());
            hasher.update(seed);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("invalid base58: {0}")]
    Encoding(#[from] bs58::decode::Error),
    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec()?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| AddressParseError::Length(v.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a held asset: a coin type or a DeFi position key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetType(String);

impl AssetType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultStatus {
    Normal,
    DuringOperation,
    Disabled,
}

/// Admin-tunable parameters. Values read by reconciliation are snapshotted
/// when an operation starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub deposit_fee_bps: u32,
    pub withdraw_fee_bps: u32,
    pub loss_tolerance_bps: u32,
    /// Max age of an asset valuation when aggregating total value
    pub max_update_interval_ms: u64,
    pub locking_time_for_withdraw_ms: u64,
    pub locking_time_for_cancel_ms: u64,
    pub min_recovery_delay_ms: u64,
    pub epoch_duration_ms: u64,
    /// Allowed pool/oracle price deviation for liquidity positions
    pub dex_slippage_bps: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            deposit_fee_bps: DEFAULT_DEPOSIT_FEE_BPS,
            withdraw_fee_bps: DEFAULT_WITHDRAW_FEE_BPS,
            loss_tolerance_bps: DEFAULT_LOSS_TOLERANCE_BPS,
            max_update_interval_ms: DEFAULT_MAX_UPDATE_INTERVAL_MS,
            locking_time_for_withdraw_ms: DEFAULT_LOCKING_TIME_FOR_WITHDRAW_MS,
            locking_time_for_cancel_ms: DEFAULT_LOCKING_TIME_FOR_CANCEL_MS,
            min_recovery_delay_ms: DEFAULT_MIN_RECOVERY_DELAY_MS,
            epoch_duration_ms: DEFAULT_EPOCH_DURATION_MS,
            dex_slippage_bps: DEFAULT_DEX_SLIPPAGE_BPS,
        }
    }
}

impl VaultConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.deposit_fee_bps <= MAX_DEPOSIT_FEE_BPS,
            VaultError::FeeTooHigh
        );
        require!(
            self.withdraw_fee_bps <= MAX_WITHDRAW_FEE_BPS,
            VaultError::FeeTooHigh
        );
        require!(
            self.loss_tolerance_bps <= RATE_SCALING,
            VaultError::InvalidConfig("loss tolerance above 100%")
        );
        require!(
            self.max_update_interval_ms > 0
                && self.max_update_interval_ms <= MAX_STALENESS_WINDOW_MS,
            VaultError::InvalidConfig("update interval must be in (0, staleness cap]")
        );
        require!(
            self.min_recovery_delay_ms >= MIN_RECOVERY_DELAY_FLOOR_MS,
            VaultError::InvalidConfig("recovery delay too short")
        );
        require!(
            self.epoch_duration_ms > 0,
            VaultError::InvalidConfig("epoch duration must be positive")
        );
        require!(
            self.dex_slippage_bps > 0 && self.dex_slippage_bps <= RATE_SCALING,
            VaultError::InvalidConfig("dex slippage must be in (0, 10000]")
        );
        Ok(())
    }
}

/// Capability for admin setters and emergency recovery
#[derive(Debug)]
pub struct AdminCap {
    pub(crate) id: Address,
    pub(crate) vault_id: Address,
}

impl AdminCap {
    pub fn id(&self) -> Address {
        self.id
    }
}

/// Capability for request execution and operations
#[derive(Debug)]
pub struct OperatorCap {
    pub(crate) id: Address,
    pub(crate) vault_id: Address,
}

impl OperatorCap {
    pub fn id(&self) -> Address {
        self.id
    }
}

/// Non-principal coin held by the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinHolding {
    pub balance: u64,
    pub decimals: u8,
}

pub struct Vault {
    pub(crate) id: Address,
    pub(crate) principal: AssetType,
    pub(crate) principal_decimals: u8,
    pub(crate) status: VaultStatus,
    pub(crate) config: VaultConfig,
    pub(crate) total_shares: U256,
    /// Principal owned by shareholders (excludes buffered deposits and fees)
    pub(crate) free_principal: u64,
    pub(crate) coins: BTreeMap<AssetType, CoinHolding>,
    pub(crate) positions: BTreeMap<AssetType, Position>,
    pub(crate) adaptors: AdaptorRegistry,
    pub(crate) valuations: ValuationRegistry,
    pub(crate) oracle: OracleGateway,
    pub(crate) receipts: BTreeMap<Address, Receipt>,
    pub(crate) requests: RequestBuffer,
    pub(crate) operation: Option<OperationRecord>,
    pub(crate) cur_epoch: u64,
    pub(crate) cur_epoch_loss: U256,
    pub(crate) cur_epoch_loss_base_usd_value: U256,
    pub(crate) collected_fees: u64,
    pub(crate) frozen_operators: BTreeSet<Address>,
    pub(crate) nonce: u64,
    pub(crate) events: Vec<VaultEvent>,
}

impl Vault {
    pub(crate) fn next_nonce(&mut self) -> u64 {
        self.nonce += 1;
        self.nonce
    }

    pub(crate) fn emit(&mut self, event: impl Into<VaultEvent>) {
        self.events.push(event.into());
    }

    pub(crate) fn assert_admin(&self, cap: &AdminCap) -> Result<()> {
        require!(cap.vault_id == self.id, VaultError::Unauthorized);
        Ok(())
    }

    pub(crate) fn assert_operator(&self, cap: &OperatorCap) -> Result<()> {
        require!(cap.vault_id == self.id, VaultError::Unauthorized);
        require!(
            !self.frozen_operators.contains(&cap.id),
            VaultError::OperatorFrozen
        );
        Ok(())
    }

    pub(crate) fn assert_normal(&self) -> Result<()> {
        require!(self.status == VaultStatus::Normal, VaultError::NotNormal);
        Ok(())
    }

    pub(crate) fn assert_not_during_operation(&self) -> Result<()> {
        require!(
            self.status != VaultStatus::DuringOperation,
            VaultError::OperationInProgress
        );
        Ok(())
    }

    pub(crate) fn epoch_of(&self, now_ms: u64) -> u64 {
        now_ms / self.config.epoch_duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_base58_roundtrip() {
        let addr = Address::derive(&[b"user", b"alice"]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(matches!(
            short.parse::<Address>(),
            Err(AddressParseError::Length(16))
        ));
    }

    #[test]
    fn test_derive_is_seed_boundary_sensitive() {
        assert_ne!(
            Address::derive(&[b"ab", b"c"]),
            Address::derive(&[b"a", b"bc"])
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        VaultConfig::default().validate().unwrap();
    }

    #[test]
    fn test_config_rejects_zero_dex_slippage() {
        let config = VaultConfig {
            dex_slippage_bps: 0,
            ..VaultConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VaultError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_update_interval() {
        let config = VaultConfig {
            max_update_interval_ms: 0,
            ..VaultConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VaultError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_excessive_fee() {
        let config = VaultConfig {
            withdraw_fee_bps: MAX_WITHDRAW_FEE_BPS + 1,
            ..VaultConfig::default()
        };
        assert_eq!(config.validate(), Err(VaultError::FeeTooHigh));
    }
}
