pub mod create;
pub mod delete;
pub mod update;

pub use create::{AuthorizationGroupCreation, CreateAuthorizationGroupsCommand};
pub use delete::DeleteAuthorizationGroupsCommand;
pub use update::{AuthorizationGroupUpdate, UpdateAuthorizationGroupsCommand};
