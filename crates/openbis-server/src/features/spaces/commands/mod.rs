pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateSpacesCommand, SpaceCreation};
pub use delete::DeleteSpacesCommand;
pub use update::{SpaceUpdate, UpdateSpacesCommand};
