pub mod admin;
pub mod assets;
pub mod execute;
pub mod initialize;
pub mod operation;
pub mod request;
pub mod value;
pub mod view;

pub use execute::WithdrawPayout;
pub use operation::OperationSummary;
pub use view::VaultSummary;
