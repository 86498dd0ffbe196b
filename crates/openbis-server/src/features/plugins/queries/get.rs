use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_plugin, Plugin, PluginFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPluginsQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: PluginFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: GetPluginsQuery) -> ApiResult<BTreeMap<String, Plugin>> {
    access_log::record(&session.user_id, "get-plugins", &[("PLUGIN_IDS", query.ids.log_repr())]);

    let wanted: Vec<&str> = query.ids.iter().map(|id| id.trim()).collect();
    let mut conn = pool.acquire().await?;
    Ok(load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.name.as_str()))
        .map(|row| to_plugin(row, &query.fetch_options))
        .map(|plugin| (plugin.perm_id.clone(), plugin))
        .collect())
}
