//! API Routes

pub mod admin;
pub mod health;
pub mod operator;
pub mod vault;

pub use admin::admin_router;
pub use health::health_router;
pub use operator::operator_router;
pub use vault::vault_router;

use volo_vault::Address;

use crate::error::{BackendError, Result};

/// Parse a base58 address from a path segment
pub(crate) fn parse_address(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| BackendError::InvalidAddress(format!("{raw}: {e}")))
}
