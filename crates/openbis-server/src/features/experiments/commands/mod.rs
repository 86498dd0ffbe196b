pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateExperimentsCommand, ExperimentCreation};
pub use delete::DeleteExperimentsCommand;
pub use update::{ExperimentUpdate, UpdateExperimentsCommand};
