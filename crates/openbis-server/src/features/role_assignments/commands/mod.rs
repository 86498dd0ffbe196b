pub mod create;
pub mod delete;

pub use create::{CreateRoleAssignmentsCommand, RoleAssignmentCreation};
pub use delete::DeleteRoleAssignmentsCommand;
