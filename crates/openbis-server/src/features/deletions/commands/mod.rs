pub mod confirm;
pub mod revert;

pub use confirm::ConfirmDeletionsCommand;
pub use revert::RevertDeletionsCommand;
