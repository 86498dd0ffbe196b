pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateExternalDmsCommand, ExternalDmsCreation};
pub use delete::DeleteExternalDmsCommand;
pub use update::{ExternalDmsUpdate, UpdateExternalDmsCommand};
