//! Oracle gateway: normalises third-party feeds to 18-decimal USD prices.
//!
//! Every read is checked for staleness, a non-zero price, the width of the
//! confidence interval and the distance from the EMA price. Any failure in
//! exponent handling degrades to [`VaultError::InvalidPrice`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constants::*,
    error::{Result, VaultError},
    math::{pow10, U256},
    require,
    state::AssetType,
};

/// Raw feed as published by the external oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    pub price: i64,
    pub exponent: i32,
    pub confidence: u64,
    pub ema_price: i64,
    pub published_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub staleness_window_ms: u64,
    pub max_confidence_bps: u32,
    pub max_ema_deviation_bps: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            staleness_window_ms: DEFAULT_ORACLE_STALENESS_MS,
            max_confidence_bps: DEFAULT_MAX_CONFIDENCE_BPS,
            max_ema_deviation_bps: DEFAULT_MAX_EMA_DEVIATION_BPS,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.staleness_window_ms > 0 && self.staleness_window_ms <= MAX_STALENESS_WINDOW_MS,
            VaultError::InvalidConfig("staleness window must be in (0, 1h]")
        );
        require!(
            self.max_confidence_bps > 0 && self.max_confidence_bps <= RATE_SCALING,
            VaultError::InvalidConfig("confidence bound must be in (0, 10000]")
        );
        require!(
            self.max_ema_deviation_bps > 0 && self.max_ema_deviation_bps <= RATE_SCALING,
            VaultError::InvalidConfig("ema deviation bound must be in (0, 10000]")
        );
        Ok(())
    }
}

/// Validated price normalised to [`ORACLE_DECIMALS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OraclePrice {
    pub price: U256,
    pub decimals: u8,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OracleGateway {
    config: OracleConfig,
    feeds: BTreeMap<AssetType, PriceFeed>,
}

impl OracleGateway {
    pub fn new(config: OracleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            feeds: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub(crate) fn set_config(&mut self, config: OracleConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Store the latest feed for `asset`; out-of-order updates are ignored.
    pub fn publish(&mut self, asset: &AssetType, feed: PriceFeed) {
        if let Some(current) = self.feeds.get(asset) {
            if current.published_at_ms > feed.published_at_ms {
                debug!(asset = %asset, "ignoring out-of-order price update");
                return;
            }
        }
        self.feeds.insert(asset.clone(), feed);
    }

    pub fn get_price(&self, asset: &AssetType, now_ms: u64) -> Result<OraclePrice> {
        self.get_price_with(asset, now_ms, &self.config)
    }

    /// Read using an explicit config (an operation's snapshot)
    pub fn get_price_with(
        &self,
        asset: &AssetType,
        now_ms: u64,
        config: &OracleConfig,
    ) -> Result<OraclePrice> {
        let feed = self
            .feeds
            .get(asset)
            .ok_or_else(|| VaultError::FeedNotFound(asset.clone()))?;

        require!(
            now_ms.saturating_sub(feed.published_at_ms) <= config.staleness_window_ms,
            VaultError::StalePrice(asset.clone())
        );

        let invalid = || VaultError::InvalidPrice(asset.clone());
        require!(feed.price > 0, invalid());
        require!(feed.ema_price > 0, invalid());

        let raw = feed.price as u128;

        // confidence / price <= max_confidence_bps / 10_000
        let conf_scaled = (feed.confidence as u128)
            .checked_mul(RATE_SCALING as u128)
            .ok_or_else(invalid)?;
        require!(
            conf_scaled <= raw * config.max_confidence_bps as u128,
            invalid()
        );

        let ema = feed.ema_price as u128;
        let diff = raw.abs_diff(ema);
        require!(
            diff * RATE_SCALING as u128 <= ema * config.max_ema_deviation_bps as u128,
            invalid()
        );

        let price = normalize(feed.price, feed.exponent).ok_or_else(invalid)?;

        Ok(OraclePrice {
            price,
            decimals: ORACLE_DECIMALS,
            updated_at_ms: feed.published_at_ms,
        })
    }
}

/// `raw × 10^(18 + exponent)`; `None` when the result is zero or unrepresentable
fn normalize(raw: i64, exponent: i32) -> Option<U256> {
    if raw <= 0 {
        return None;
    }
    let shift = (ORACLE_DECIMALS as i32).checked_add(exponent)?;
    let value = U256::from(raw as u64);
    let scaled = if shift >= 0 {
        if shift > 77 {
            return None;
        }
        value.checked_mul(pow10(shift as u32)?)?
    } else {
        let down = shift.unsigned_abs();
        if down > 77 {
            return None;
        }
        value / pow10(down)?
    };
    (!scaled.is_zero()).then_some(scaled)
}
