use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::{plugins::require, shared::validation::blank_to_none},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginUpdate {
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePluginsCommand {
    pub updates: Vec<PluginUpdate>,
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &UpdatePluginsCommand) -> ApiResult<()> {
    for update in &command.updates {
        let plugin = require(conn, &update.plugin_id).await?;
        require_instance_admin_for(session, "PluginPermId", &plugin.name)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE plugins SET description = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(plugin.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(script) = &update.script {
            sqlx::query("UPDATE plugins SET script = ? WHERE id = ?")
                .bind(script)
                .bind(plugin.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(available) = update.available {
            sqlx::query("UPDATE plugins SET available = ? WHERE id = ?")
                .bind(available)
                .bind(plugin.id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdatePluginsCommand) -> ApiResult<()> {
    let ids: Vec<&str> = command.updates.iter().map(|u| u.plugin_id.as_str()).collect();
    access_log::record(&session.user_id, "update-plugins", &[("PLUGIN_UPDATES", format!("{:?}", ids))]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
