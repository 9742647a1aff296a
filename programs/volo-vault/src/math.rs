#![allow(clippy::assign_op_pattern, clippy::manual_div_ceil)]

use crate::{
    constants::{ORACLE_DECIMALS, RATE_SCALING, RATIO_DECIMALS},
    error::{Result, VaultError},
    require,
};

mod u256 {
    use uint::construct_uint;

    construct_uint! {
        pub struct U256(4);
    }
}

pub use u256::U256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rounding {
    Floor,
    Ceiling,
}

/// 10^exp, or `None` when it does not fit in 256 bits
pub fn pow10(exp: u32) -> Option<U256> {
    let ten = U256::from(10u8);
    let mut acc = U256::one();
    for _ in 0..exp {
        acc = acc.checked_mul(ten)?;
    }
    Some(acc)
}

/// Safe multiplication then division with configurable rounding.
///
/// Computes: (value × numerator) / denominator
pub fn mul_div(value: U256, numerator: U256, denominator: U256, rounding: Rounding) -> Result<U256> {
    require!(!denominator.is_zero(), VaultError::DivisionByZero);

    let product = value
        .checked_mul(numerator)
        .ok_or(VaultError::MathOverflow)?;

    let result = match rounding {
        Rounding::Floor => product / denominator,
        Rounding::Ceiling => {
            let (q, r) = product.div_mod(denominator);
            if r.is_zero() {
                q
            } else {
                q.checked_add(U256::one()).ok_or(VaultError::MathOverflow)?
            }
        }
    };

    Ok(result)
}

/// `amount × rate_bps / 10_000`, floor rounding
pub fn apply_bps(amount: U256, rate_bps: u32) -> Result<U256> {
    mul_div(
        amount,
        U256::from(rate_bps),
        U256::from(RATE_SCALING),
        Rounding::Floor,
    )
}

/// USD value (18 decimals) of a native `amount` with `coin_decimals`, given a
/// price normalised to [`ORACLE_DECIMALS`].
pub fn usd_value_of(amount: U256, price: U256, coin_decimals: u8) -> Result<U256> {
    let scale = pow10(coin_decimals as u32).ok_or(VaultError::MathOverflow)?;
    mul_div(amount, price, scale, Rounding::Floor)
}

/// Native amount worth `usd_value` at `price`; floor rounding favours the vault.
pub fn amount_for_usd(usd_value: U256, price: U256, coin_decimals: u8) -> Result<U256> {
    let scale = pow10(coin_decimals as u32).ok_or(VaultError::MathOverflow)?;
    mul_div(usd_value, scale, price, Rounding::Floor)
}

/// Fixed-point unit for share ratios
pub fn ratio_unit() -> U256 {
    pow10(RATIO_DECIMALS as u32).unwrap_or_default()
}

/// Fixed-point unit for normalised oracle prices
pub fn price_unit() -> U256 {
    pow10(ORACLE_DECIMALS as u32).unwrap_or_default()
}

/// Shares minted for `usd_value` at `ratio` (floor - favours vault)
pub fn shares_for_usd(usd_value: U256, ratio: U256) -> Result<U256> {
    mul_div(usd_value, ratio_unit(), ratio, Rounding::Floor)
}

/// USD value redeemed by `shares` at `ratio` (floor - favours vault)
pub fn usd_for_shares(shares: U256, ratio: U256) -> Result<U256> {
    mul_div(shares, ratio, ratio_unit(), Rounding::Floor)
}

/// Range-checked narrowing into the native transfer type
pub fn to_u64(value: U256) -> Result<u64> {
    require!(value <= U256::from(u64::MAX), VaultError::AmountOverflow);
    Ok(value.low_u64())
}

/// Relative deviation `|a - b| / b` in basis points (ceiling)
pub fn deviation_bps(a: U256, b: U256) -> Result<U256> {
    let diff = if a > b { a - b } else { b - a };
    mul_div(diff, U256::from(RATE_SCALING), b, Rounding::Ceiling)
}

/// Decimal-string serde for [`U256`] so JSON consumers never lose precision
pub mod u256_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::U256;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(&raw).map_err(|e| D::Error::custom(format!("invalid u256: {e:?}")))
    }
}
