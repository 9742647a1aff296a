#![allow(dead_code)]

use volo_vault::{
    oracle::{OracleConfig, PriceFeed},
    Address, AdminCap, AssetType, OperatorCap, Vault, VaultConfig, U256,
};

pub const T0: u64 = 1_700_000_000_000;

/// 18-decimal principal so one native unit is one USD unit at $1
pub fn usdx() -> AssetType {
    AssetType::from("0xabc::usdx::USDX")
}

pub fn user(name: &str) -> Address {
    Address::derive(&[b"user", name.as_bytes()])
}

pub fn dollar_feed(now_ms: u64) -> PriceFeed {
    price_feed(100_000_000, now_ms)
}

/// Raw feed with exponent -8
pub fn price_feed(price: i64, now_ms: u64) -> PriceFeed {
    PriceFeed {
        price,
        exponent: -8,
        confidence: 0,
        ema_price: price,
        published_at_ms: now_ms,
    }
}

pub fn config() -> VaultConfig {
    VaultConfig {
        deposit_fee_bps: 0,
        withdraw_fee_bps: 0,
        locking_time_for_withdraw_ms: 0,
        locking_time_for_cancel_ms: 0,
        ..VaultConfig::default()
    }
}

pub struct Harness {
    pub vault: Vault,
    pub admin: AdminCap,
    pub operator: OperatorCap,
    pub now: u64,
}

impl Harness {
    pub fn new(config: VaultConfig) -> Self {
        let (mut vault, admin) =
            Vault::new(usdx(), 18, config, OracleConfig::default(), T0).unwrap();
        let operator = vault.create_operator_cap(&admin).unwrap();
        let mut harness = Self {
            vault,
            admin,
            operator,
            now: T0,
        };
        harness.refresh();
        harness
    }

    /// Republish the $1 price and revalue the principal at `now`
    pub fn refresh(&mut self) {
        self.vault.publish_price(&usdx(), dollar_feed(self.now));
        self.vault.update_asset_value(&usdx(), None, self.now).unwrap();
    }

    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }

    pub fn deposit(&mut self, owner: Address, amount: u64) -> Address {
        let (request_id, receipt_id) = self
            .vault
            .request_deposit(owner, None, amount, U256::zero(), self.now)
            .unwrap();
        self.vault
            .execute_deposit(&self.operator, request_id, U256::MAX, self.now)
            .unwrap();
        receipt_id
    }
}
