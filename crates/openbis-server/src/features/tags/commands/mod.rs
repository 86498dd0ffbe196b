pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateTagsCommand, TagCreation};
pub use delete::DeleteTagsCommand;
pub use update::{TagUpdate, UpdateTagsCommand};
