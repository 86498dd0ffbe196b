pub mod delete;
pub mod execute;
pub mod update;

pub use delete::DeleteOperationExecutionsCommand;
pub use execute::{ExecuteOperationsCommand, ExecutionOptions, ExecutionResults};
pub use update::{OperationExecutionUpdate, UpdateOperationExecutionsCommand};
