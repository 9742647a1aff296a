//! Volo Vault
//!
//! A multi-asset vault whose principal is lent out to external DeFi protocols
//! by an operator. Users queue deposit and withdraw requests; the operator
//! executes them against the current share ratio, and runs operations that
//! borrow assets, return them, revalue them and reconcile the result against a
//! per-epoch loss tolerance.
//!
//! Operation lifecycle:
//!
//! ```text
//! Normal --start_operation--> DuringOperation
//!     --end_operation_returns--> (value updates enabled)
//!     --update_asset_value (every borrowed asset)-->
//!     --end_operation_reconcile--> Normal
//!
//! DuringOperation --force_recover (admin, after delay)--> Normal
//! Normal <--set_enabled--> Disabled
//! ```

pub mod adaptors;
pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod math;
pub mod oracle;
pub mod receipt;
pub mod record;
pub mod requests;
pub mod state;
pub mod valuation;

pub use error::{Result, VaultError};
pub use instructions::{OperationSummary, VaultSummary, WithdrawPayout};
pub use math::U256;
pub use state::{
    Address, AdminCap, AssetType, CoinHolding, OperatorCap, Vault, VaultConfig, VaultStatus,
};
