//! Create plugins command

use chrono::Utc;
use openbis_common::types::{EntityKind, PluginType};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::{ApiError, ApiResult},
    features::shared::{
        error_helpers::map_unique_violation,
        validation::{blank_to_none, require_non_empty},
    },
};

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginCreation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub plugin_type: PluginType,
    /// Kind of entity the plugin applies to; `None` means any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_kind: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

crate::struct_log_repr!(PluginCreation, "PluginCreation", "name" => name);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePluginsCommand {
    pub creations: Vec<PluginCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreatePluginsCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating plugins")?;

    let now = Utc::now();
    let mut names = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let name = require_non_empty(Some(&creation.name), "Plugin name")?.to_string();
        if name.chars().any(char::is_whitespace) {
            return Err(ApiError::user(format!("Plugin name '{}' cannot contain white spaces", name)));
        }

        sqlx::query(
            r#"
            INSERT INTO plugins
                (name, description, plugin_type, entity_kind, script, available, registrator_id, registration_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&name)
        .bind(blank_to_none(creation.description.clone()))
        .bind(creation.plugin_type.as_str())
        .bind(creation.entity_kind.map(|k| k.as_str()))
        .bind(&creation.script)
        .bind(creation.available)
        .bind(session.person_id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Plugin '{}' already exists", name)))?;
        names.push(name);
    }
    Ok(names)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: CreatePluginsCommand) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-plugins", &[("NEW_PLUGINS", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let names = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(names)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, SPACE_POWER_USER};

    fn validation_plugin(name: &str, kind: Option<EntityKind>) -> PluginCreation {
        PluginCreation {
            name: name.into(),
            description: None,
            plugin_type: PluginType::EntityValidation,
            entity_kind: kind,
            script: Some("def validate(entity, isNew):\n    pass".into()),
            available: true,
        }
    }

    #[tokio::test]
    async fn test_create_keeps_name_case() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = CreatePluginsCommand {
            creations: vec![validation_plugin("validateSamples", Some(EntityKind::Sample))],
        };
        let names = handle(&ctx.pool, &admin, command).await.unwrap();
        assert_eq!(names, vec!["validateSamples"]);
    }

    #[tokio::test]
    async fn test_name_with_spaces_rejected() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = CreatePluginsCommand {
            creations: vec![validation_plugin("bad name", None)],
        };
        assert!(handle(&ctx.pool, &admin, command).await.is_err());
    }

    #[tokio::test]
    async fn test_power_user_rejected() {
        let ctx = TestContext::new().await;
        let session = ctx.session(SPACE_POWER_USER).await;
        let command = CreatePluginsCommand {
            creations: vec![validation_plugin("p", None)],
        };
        let err = handle(&ctx.pool, &session, command).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));
    }
}
