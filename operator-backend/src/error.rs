//! Error types for the Volo operator backend

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use volo_vault::VaultError;

/// Backend error types
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Request expired: timestamp outside the accepted window")]
    RequestExpired,

    #[error("Request signature already used")]
    RequestReplayed,

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

/// HTTP status and stable code for a vault error
pub fn vault_error_status(err: &VaultError) -> (StatusCode, &'static str) {
    use VaultError::*;

    match err {
        ZeroAmount => (StatusCode::BAD_REQUEST, "ZERO_AMOUNT"),
        InvalidPrice(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PRICE"),
        AmountOverflow => (StatusCode::BAD_REQUEST, "AMOUNT_OVERFLOW"),
        ZeroShares => (StatusCode::UNPROCESSABLE_ENTITY, "ZERO_SHARES"),
        DegenerateRatio => (StatusCode::UNPROCESSABLE_ENTITY, "DEGENERATE_RATIO"),
        SlippageExceeded => (StatusCode::UNPROCESSABLE_ENTITY, "SLIPPAGE_EXCEEDED"),
        MathOverflow => (StatusCode::UNPROCESSABLE_ENTITY, "MATH_OVERFLOW"),
        DivisionByZero => (StatusCode::UNPROCESSABLE_ENTITY, "DIVISION_BY_ZERO"),
        InvalidConfig(_) => (StatusCode::BAD_REQUEST, "INVALID_CONFIG"),
        InsufficientShares => (StatusCode::BAD_REQUEST, "INSUFFICIENT_SHARES"),
        InsufficientPrincipal => (StatusCode::CONFLICT, "INSUFFICIENT_PRINCIPAL"),
        InsufficientBalance(_) => (StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE"),
        FeeTooHigh => (StatusCode::BAD_REQUEST, "FEE_TOO_HIGH"),

        StalePrice(_) => (StatusCode::SERVICE_UNAVAILABLE, "STALE_PRICE"),
        StaleValuation(_) => (StatusCode::SERVICE_UNAVAILABLE, "STALE_VALUATION"),
        RequestLocked => (StatusCode::CONFLICT, "REQUEST_LOCKED"),
        WithdrawLocked => (StatusCode::CONFLICT, "WITHDRAW_LOCKED"),
        RecoveryTooEarly => (StatusCode::CONFLICT, "RECOVERY_TOO_EARLY"),

        FeedNotFound(_) => (StatusCode::NOT_FOUND, "FEED_NOT_FOUND"),
        AssetNotFound(_) => (StatusCode::NOT_FOUND, "ASSET_NOT_FOUND"),
        AdaptorNotFound(_) => (StatusCode::NOT_FOUND, "ADAPTOR_NOT_FOUND"),
        RequestNotFound(_) => (StatusCode::NOT_FOUND, "REQUEST_NOT_FOUND"),
        ReceiptNotFound => (StatusCode::NOT_FOUND, "RECEIPT_NOT_FOUND"),

        NotNormal => (StatusCode::CONFLICT, "NOT_NORMAL"),
        NotDuringOperation => (StatusCode::CONFLICT, "NOT_DURING_OPERATION"),
        OperationInProgress => (StatusCode::CONFLICT, "OPERATION_IN_PROGRESS"),
        ValueUpdateDisabled => (StatusCode::CONFLICT, "VALUE_UPDATE_DISABLED"),
        IncompleteValueUpdate(_) => (StatusCode::CONFLICT, "INCOMPLETE_VALUE_UPDATE"),
        ShareCountMismatch => (StatusCode::CONFLICT, "SHARE_COUNT_MISMATCH"),
        LossToleranceExceeded => (StatusCode::CONFLICT, "LOSS_TOLERANCE_EXCEEDED"),
        AssetNotReturned(_) => (StatusCode::CONFLICT, "ASSET_NOT_RETURNED"),
        AssetsNotReturned => (StatusCode::CONFLICT, "ASSETS_NOT_RETURNED"),
        AssetsAlreadyReturned => (StatusCode::CONFLICT, "ASSETS_ALREADY_RETURNED"),
        UnexpectedAsset(_) => (StatusCode::CONFLICT, "UNEXPECTED_ASSET"),
        AssetBorrowed(_) => (StatusCode::CONFLICT, "ASSET_BORROWED"),
        AssetAlreadyExists(_) => (StatusCode::CONFLICT, "ASSET_ALREADY_EXISTS"),
        AssetNotEmpty(_) => (StatusCode::CONFLICT, "ASSET_NOT_EMPTY"),
        MarketMismatch(_) => (StatusCode::BAD_REQUEST, "MARKET_MISMATCH"),
        PoolPriceDeviation => (StatusCode::CONFLICT, "POOL_PRICE_DEVIATION"),
        HealthFactorTooLow => (StatusCode::CONFLICT, "HEALTH_FACTOR_TOO_LOW"),
        ReceiptBusy => (StatusCode::CONFLICT, "RECEIPT_BUSY"),

        RecipientMismatch => (StatusCode::FORBIDDEN, "RECIPIENT_MISMATCH"),
        Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
        OperatorFrozen => (StatusCode::FORBIDDEN, "OPERATOR_FROZEN"),
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let (status, code, retryable) = match &self {
            BackendError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            BackendError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", false),
            BackendError::InvalidSignature(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", false)
            }
            BackendError::RequestExpired => (StatusCode::BAD_REQUEST, "REQUEST_EXPIRED", false),
            BackendError::RequestReplayed => (StatusCode::CONFLICT, "REQUEST_REPLAYED", false),
            BackendError::Vault(err) => {
                let (status, code) = vault_error_status(err);
                (status, code, err.is_retryable())
            }
            BackendError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false)
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            retryable,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        BackendError::Internal(err.to_string())
    }
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;
    use volo_vault::AssetType;

    #[test]
    fn test_staleness_is_retryable() {
        let response = BackendError::from(VaultError::StalePrice(AssetType::new("SUI")))
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_authorization_maps_to_forbidden() {
        for err in [
            VaultError::Unauthorized,
            VaultError::OperatorFrozen,
            VaultError::RecipientMismatch,
        ] {
            assert_eq!(vault_error_status(&err).0, StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_reconciliation_failures_are_conflicts() {
        let (status, code) = vault_error_status(&VaultError::LossToleranceExceeded);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "LOSS_TOLERANCE_EXCEEDED");
    }
}
