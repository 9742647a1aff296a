pub const VAULT_SEED: &[u8] = b"vault";
pub const RECEIPT_SEED: &[u8] = b"receipt";
pub const ADMIN_CAP_SEED: &[u8] = b"admin_cap";
pub const OPERATOR_CAP_SEED: &[u8] = b"operator_cap";

/// Basis-point denominator for fees, tolerances and deviation bounds
pub const RATE_SCALING: u32 = 10_000;

/// Oracle prices are normalised to this many decimals
pub const ORACLE_DECIMALS: u8 = 18;
/// Share ratio fixed-point precision (1e18 == one USD unit per share)
pub const RATIO_DECIMALS: u8 = 18;

pub const MAX_DEPOSIT_FEE_BPS: u32 = 500;
pub const MAX_WITHDRAW_FEE_BPS: u32 = 500;
pub const DEFAULT_DEPOSIT_FEE_BPS: u32 = 10;
pub const DEFAULT_WITHDRAW_FEE_BPS: u32 = 10;

pub const DEFAULT_LOSS_TOLERANCE_BPS: u32 = 10;

pub const DEFAULT_ORACLE_STALENESS_MS: u64 = 60_000;
pub const MAX_STALENESS_WINDOW_MS: u64 = 3_600_000;
pub const DEFAULT_MAX_UPDATE_INTERVAL_MS: u64 = 60_000;

pub const DEFAULT_MAX_CONFIDENCE_BPS: u32 = 200;
pub const DEFAULT_MAX_EMA_DEVIATION_BPS: u32 = 500;
pub const DEFAULT_DEX_SLIPPAGE_BPS: u32 = 100;

pub const DEFAULT_LOCKING_TIME_FOR_WITHDRAW_MS: u64 = 12 * 3_600_000;
pub const DEFAULT_LOCKING_TIME_FOR_CANCEL_MS: u64 = 5 * 60_000;

pub const DEFAULT_MIN_RECOVERY_DELAY_MS: u64 = 24 * 3_600_000;
/// Recovery must never be instantaneous
pub const MIN_RECOVERY_DELAY_FLOOR_MS: u64 = 3_600_000;

pub const DEFAULT_EPOCH_DURATION_MS: u64 = 24 * 3_600_000;
