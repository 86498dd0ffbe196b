pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreatePersonsCommand, PersonCreation};
pub use delete::DeletePersonsCommand;
pub use update::{PersonUpdate, UpdatePersonsCommand};
