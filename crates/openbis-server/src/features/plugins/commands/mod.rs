pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreatePluginsCommand, PluginCreation};
pub use delete::DeletePluginsCommand;
pub use update::{PluginUpdate, UpdatePluginsCommand};
