pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateMaterialsCommand, MaterialCreation};
pub use delete::DeleteMaterialsCommand;
pub use update::{MaterialUpdate, UpdateMaterialsCommand};
