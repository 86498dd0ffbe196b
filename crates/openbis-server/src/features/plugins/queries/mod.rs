pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{error::ApiResult, features::shared::fetch::Fetched};

pub use get::GetPluginsQuery;
pub use search::{PluginSearchCriteria, SearchPluginsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginFetchOptions {
    pub script: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub perm_id: String,
    pub name: String,
    pub description: Option<String>,
    pub plugin_type: String,
    pub entity_kind: Option<String>,
    pub available: bool,
    pub registration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub script: Fetched<Option<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PluginRow {
    pub name: String,
    pub description: Option<String>,
    pub plugin_type: String,
    pub entity_kind: Option<String>,
    pub script: Option<String>,
    pub available: bool,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<PluginRow>> {
    let rows = sqlx::query_as::<_, PluginRow>(
        r#"
        SELECT pl.name, pl.description, pl.plugin_type, pl.entity_kind, pl.script, pl.available,
               p.user_id AS registrator, pl.registration_date
        FROM plugins pl
        LEFT JOIN persons p ON p.id = pl.registrator_id
        ORDER BY pl.name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) fn to_plugin(row: PluginRow, fetch: &PluginFetchOptions) -> Plugin {
    Plugin {
        perm_id: row.name.clone(),
        script: Fetched::when(fetch.script, || row.script),
        registrator: Fetched::when(fetch.registrator, || row.registrator),
        name: row.name,
        description: row.description,
        plugin_type: row.plugin_type,
        entity_kind: row.entity_kind,
        available: row.available,
        registration_date: row.registration_date,
    }
}
