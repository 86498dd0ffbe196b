pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateProjectsCommand, ProjectCreation};
pub use delete::DeleteProjectsCommand;
pub use update::{ProjectUpdate, UpdateProjectsCommand};
