pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreatePropertyTypesCommand, PropertyTypeCreation};
pub use delete::DeletePropertyTypesCommand;
pub use update::{PropertyTypeUpdate, UpdatePropertyTypesCommand};
