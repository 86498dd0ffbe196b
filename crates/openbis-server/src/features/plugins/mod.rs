//! Plugins: validation, dynamic and managed property scripts
//!
//! Scripts are stored and bound to entity types or property assignments but
//! never executed by the server.

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::error::{ApiError, ApiResult};

pub use commands::{CreatePluginsCommand, DeletePluginsCommand, PluginCreation, PluginUpdate, UpdatePluginsCommand};
pub use queries::{GetPluginsQuery, Plugin, PluginFetchOptions, PluginSearchCriteria, SearchPluginsQuery};
pub use routes::plugins_routes;

#[derive(Debug, Clone, FromRow)]
pub struct PluginRecord {
    pub id: i64,
    pub name: String,
    pub plugin_type: String,
    pub entity_kind: Option<String>,
}

/// Plugins are addressed by name, which is their perm id
pub async fn resolve(conn: &mut SqliteConnection, name: &str) -> ApiResult<Option<PluginRecord>> {
    let record = sqlx::query_as::<_, PluginRecord>(
        "SELECT id, name, plugin_type, entity_kind FROM plugins WHERE name = ?",
    )
    .bind(name.trim())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, name: &str) -> ApiResult<PluginRecord> {
    resolve(conn, name)
        .await?
        .ok_or_else(|| ApiError::not_found("PluginPermId", name.trim()))
}
