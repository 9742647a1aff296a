use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VaultError},
    math::{u256_string, U256},
    require,
    state::AssetType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetValuation {
    #[serde(with = "u256_string")]
    pub usd_value: U256,
    pub last_updated_ms: u64,
}

/// Cached USD value per held asset; the source of truth for total vault value
#[derive(Debug, Clone, Default)]
pub struct ValuationRegistry {
    entries: BTreeMap<AssetType, AssetValuation>,
    borrowed: BTreeSet<AssetType>,
    /// Entries whose cached value no longer reflects holdings
    invalidated: BTreeSet<AssetType>,
}

impl ValuationRegistry {
    pub fn register(&mut self, asset: &AssetType, now_ms: u64) -> Result<()> {
        require!(
            !self.entries.contains_key(asset),
            VaultError::AssetAlreadyExists(asset.clone())
        );
        self.entries.insert(
            asset.clone(),
            AssetValuation {
                usd_value: U256::zero(),
                last_updated_ms: now_ms,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, asset: &AssetType) -> Result<AssetValuation> {
        require!(
            !self.borrowed.contains(asset),
            VaultError::AssetBorrowed(asset.clone())
        );
        self.invalidated.remove(asset);
        self.entries
            .remove(asset)
            .ok_or_else(|| VaultError::AssetNotFound(asset.clone()))
    }

    /// Drop an entry regardless of custody; used when recovery writes an asset off
    pub(crate) fn write_off(&mut self, asset: &AssetType) -> Option<AssetValuation> {
        self.borrowed.remove(asset);
        self.invalidated.remove(asset);
        self.entries.remove(asset)
    }

    /// Force a refresh before the entry counts towards total value again
    pub(crate) fn invalidate(&mut self, asset: &AssetType) {
        if self.entries.contains_key(asset) {
            self.invalidated.insert(asset.clone());
        }
    }

    pub fn is_invalidated(&self, asset: &AssetType) -> bool {
        self.invalidated.contains(asset)
    }

    pub fn update(&mut self, asset: &AssetType, usd_value: U256, now_ms: u64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(asset)
            .ok_or_else(|| VaultError::AssetNotFound(asset.clone()))?;
        entry.usd_value = usd_value;
        entry.last_updated_ms = now_ms;
        self.invalidated.remove(asset);
        Ok(())
    }

    pub fn get(&self, asset: &AssetType) -> Option<&AssetValuation> {
        self.entries.get(asset)
    }

    pub fn contains(&self, asset: &AssetType) -> bool {
        self.entries.contains_key(asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetType, &AssetValuation)> {
        self.entries.iter()
    }

    pub(crate) fn mark_borrowed(&mut self, asset: &AssetType) {
        self.borrowed.insert(asset.clone());
    }

    pub(crate) fn mark_returned(&mut self, asset: &AssetType) {
        self.borrowed.remove(asset);
    }

    pub fn is_borrowed(&self, asset: &AssetType) -> bool {
        self.borrowed.contains(asset)
    }

    /// Fresh value of a single asset
    pub fn value_of(&self, asset: &AssetType, now_ms: u64, max_update_interval_ms: u64) -> Result<U256> {
        require!(
            !self.borrowed.contains(asset),
            VaultError::AssetBorrowed(asset.clone())
        );
        let entry = self
            .entries
            .get(asset)
            .ok_or_else(|| VaultError::AssetNotFound(asset.clone()))?;
        require!(
            !self.invalidated.contains(asset)
                && now_ms.saturating_sub(entry.last_updated_ms) <= max_update_interval_ms,
            VaultError::StaleValuation(asset.clone())
        );
        Ok(entry.usd_value)
    }

    /// Sum of every tracked entry, zero and dust entries included.
    ///
    /// Fails if any asset is in custody or its valuation is older than
    /// `max_update_interval_ms`.
    pub fn total_value(&self, now_ms: u64, max_update_interval_ms: u64) -> Result<U256> {
        let mut total = U256::zero();
        for asset in self.entries.keys() {
            let value = self.value_of(asset, now_ms, max_update_interval_ms)?;
            total = total.checked_add(value).ok_or(VaultError::MathOverflow)?;
        }
        Ok(total)
    }

    /// Sum of last recorded values, ignoring age, custody and invalidation
    pub(crate) fn recorded_total(&self) -> U256 {
        self.entries
            .values()
            .fold(U256::zero(), |acc, v| acc.saturating_add(v.usd_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> AssetType {
        AssetType::from(name)
    }

    #[test]
    fn test_total_value_sums_all_entries() {
        let mut registry = ValuationRegistry::default();
        registry.register(&asset("a"), 0).unwrap();
        registry.register(&asset("dust"), 0).unwrap();
        registry.register(&asset("zero"), 0).unwrap();
        registry.update(&asset("a"), U256::from(1_000u64), 10).unwrap();
        registry.update(&asset("dust"), U256::from(1u64), 10).unwrap();
        registry.update(&asset("zero"), U256::zero(), 10).unwrap();
        assert_eq!(registry.total_value(10, 0).unwrap(), U256::from(1_001u64));
    }

    #[test]
    fn test_zero_entry_still_checked_for_staleness() {
        let mut registry = ValuationRegistry::default();
        registry.register(&asset("a"), 0).unwrap();
        registry.register(&asset("zero"), 0).unwrap();
        registry.update(&asset("a"), U256::from(5u64), 100).unwrap();
        assert_eq!(
            registry.total_value(100, 50),
            Err(VaultError::StaleValuation(asset("zero")))
        );
    }

    #[test]
    fn test_borrowed_asset_blocks_total_value() {
        let mut registry = ValuationRegistry::default();
        registry.register(&asset("a"), 0).unwrap();
        registry.mark_borrowed(&asset("a"));
        assert_eq!(
            registry.total_value(0, 10),
            Err(VaultError::AssetBorrowed(asset("a")))
        );
        registry.mark_returned(&asset("a"));
        assert!(registry.total_value(0, 10).is_ok());
    }

    #[test]
    fn test_invalidated_entry_needs_refresh() {
        let mut registry = ValuationRegistry::default();
        registry.register(&asset("a"), 0).unwrap();
        registry.update(&asset("a"), U256::from(7u64), 5).unwrap();
        registry.invalidate(&asset("a"));
        assert_eq!(
            registry.value_of(&asset("a"), 5, 100),
            Err(VaultError::StaleValuation(asset("a")))
        );
        assert_eq!(registry.recorded_total(), U256::from(7u64));

        registry.update(&asset("a"), U256::from(3u64), 6).unwrap();
        assert_eq!(registry.value_of(&asset("a"), 6, 100).unwrap(), U256::from(3u64));
    }

    #[test]
    fn test_register_twice_fails() {
        let mut registry = ValuationRegistry::default();
        registry.register(&asset("a"), 0).unwrap();
        assert_eq!(
            registry.register(&asset("a"), 0),
            Err(VaultError::AssetAlreadyExists(asset("a")))
        );
    }
}
