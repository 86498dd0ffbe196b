pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateQueriesCommand, QueryCreation};
pub use delete::DeleteQueriesCommand;
pub use update::{QueryUpdate, UpdateQueriesCommand};
