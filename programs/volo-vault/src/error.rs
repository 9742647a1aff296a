use thiserror::Error;

use crate::state::AssetType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    // ---- validation ----
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Invalid oracle price for {0}")]
    InvalidPrice(AssetType),

    #[error("Amount does not fit the transferable amount type")]
    AmountOverflow,

    #[error("Execution would mint zero shares")]
    ZeroShares,

    #[error("Vault holds shares but no value")]
    DegenerateRatio,

    #[error("Slippage tolerance exceeded")]
    SlippageExceeded,

    #[error("Arithmetic overflow")]
    MathOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Insufficient shares balance")]
    InsufficientShares,

    #[error("Insufficient principal in vault")]
    InsufficientPrincipal,

    #[error("Insufficient balance of {0}")]
    InsufficientBalance(AssetType),

    #[error("Fee rate above maximum")]
    FeeTooHigh,

    // ---- staleness ----
    #[error("Oracle price for {0} is stale")]
    StalePrice(AssetType),

    #[error("Valuation of {0} is stale")]
    StaleValuation(AssetType),

    #[error("No oracle feed configured for {0}")]
    FeedNotFound(AssetType),

    // ---- lifecycle / invariants ----
    #[error("Vault is not in normal status")]
    NotNormal,

    #[error("Vault is not during operation")]
    NotDuringOperation,

    #[error("Operation in progress")]
    OperationInProgress,

    #[error("Value updates are disabled until borrowed assets are returned")]
    ValueUpdateDisabled,

    #[error("Borrowed asset {0} was not updated")]
    IncompleteValueUpdate(AssetType),

    #[error("Total shares changed during operation")]
    ShareCountMismatch,

    #[error("Loss tolerance exceeded for current epoch")]
    LossToleranceExceeded,

    #[error("Borrowed asset {0} was not returned")]
    AssetNotReturned(AssetType),

    #[error("Borrowed assets have not been returned")]
    AssetsNotReturned,

    #[error("Borrowed assets were already returned")]
    AssetsAlreadyReturned,

    #[error("Asset {0} was not borrowed in this operation")]
    UnexpectedAsset(AssetType),

    #[error("Asset {0} is held in operator custody")]
    AssetBorrowed(AssetType),

    #[error("Asset {0} not found")]
    AssetNotFound(AssetType),

    #[error("Asset {0} already registered")]
    AssetAlreadyExists(AssetType),

    #[error("Asset {0} still holds value")]
    AssetNotEmpty(AssetType),

    #[error("No adaptor registered for {0}")]
    AdaptorNotFound(AssetType),

    #[error("Market reference does not match position {0}")]
    MarketMismatch(AssetType),

    #[error("Pool price deviates from oracle beyond tolerance")]
    PoolPriceDeviation,

    #[error("Lending position health factor below minimum")]
    HealthFactorTooLow,

    #[error("Recovery delay has not elapsed")]
    RecoveryTooEarly,

    // ---- requests / receipts ----
    #[error("Request {0} not found")]
    RequestNotFound(u64),

    #[error("Receipt not found")]
    ReceiptNotFound,

    #[error("Receipt has pending requests")]
    ReceiptBusy,

    #[error("Request is still locked")]
    RequestLocked,

    #[error("Withdrawal is locked after a recent deposit")]
    WithdrawLocked,

    // ---- authorization ----
    #[error("Requester is no longer the receipt owner")]
    RecipientMismatch,

    #[error("Unauthorized - caller does not hold the required capability")]
    Unauthorized,

    #[error("Operator is frozen")]
    OperatorFrozen,
}

impl VaultError {
    /// Errors that clear on their own: stale prices and valuations after an
    /// update, `RequestLocked` once the locking window has passed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::StalePrice(_) | VaultError::StaleValuation(_) | VaultError::RequestLocked
        )
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Early-return with the given error when the condition does not hold
#[macro_export]
macro_rules! require {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let asset = AssetType::from("sui");
        assert!(VaultError::StalePrice(asset.clone()).is_retryable());
        assert!(VaultError::StaleValuation(asset.clone()).is_retryable());
        assert!(VaultError::RequestLocked.is_retryable());

        assert!(!VaultError::MarketMismatch(asset).is_retryable());
        assert!(!VaultError::LossToleranceExceeded.is_retryable());
    }
}
