//! Delete plugins command
//!
//! A plugin bound to an entity type or to a property assignment is being used.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{plugins::resolve, shared::validation::validate_deletion},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletePluginsCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &DeletePluginsCommand) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        require_instance_admin_for(session, "PluginPermId", id.trim())?;
        let Some(plugin) = resolve(conn, id).await? else {
            continue;
        };

        let bound: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM entity_types WHERE validation_plugin_id = ?1)
                 + (SELECT COUNT(*) FROM property_assignments WHERE plugin_id = ?1)
            "#,
        )
        .bind(plugin.id)
        .fetch_one(&mut *conn)
        .await?;
        if bound > 0 {
            return Err(ApiError::being_used(format!("Plugin '{}'", plugin.name)));
        }

        sqlx::query("DELETE FROM plugins WHERE id = ?")
            .bind(plugin.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeletePluginsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-plugins",
        &[
            ("PLUGIN_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        entity_types::{
            commands::{update, EntityTypeUpdate, UpdateEntityTypesCommand},
            SampleTypes,
        },
        plugins::commands::create::{self, CreatePluginsCommand, PluginCreation},
        shared::test_helpers::TestContext,
    };
    use openbis_common::types::{EntityKind, PluginType};

    fn delete(name: &str) -> DeletePluginsCommand {
        DeletePluginsCommand {
            ids: Some(vec![name.into()]),
            reason: Some("obsolete".into()),
        }
    }

    #[tokio::test]
    async fn test_bound_plugin_is_being_used() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = PluginCreation {
            name: "validatePlate".into(),
            description: None,
            plugin_type: PluginType::EntityValidation,
            entity_kind: Some(EntityKind::Sample),
            script: None,
            available: true,
        };
        create::handle(&ctx.pool, &admin, CreatePluginsCommand { creations: vec![creation] })
            .await
            .unwrap();

        let mut binding = EntityTypeUpdate::new("CELL_PLATE");
        binding.validation_plugin_id = Some(Some("validatePlate".into()));
        update::handle::<SampleTypes>(&ctx.pool, &admin, UpdateEntityTypesCommand { updates: vec![binding] })
            .await
            .unwrap();

        let err = handle(&ctx.pool, &admin, delete("validatePlate")).await.unwrap_err();
        assert_eq!(err.to_string(), "Plugin 'validatePlate' is being used");

        let mut unbinding = EntityTypeUpdate::new("CELL_PLATE");
        unbinding.validation_plugin_id = Some(None);
        update::handle::<SampleTypes>(&ctx.pool, &admin, UpdateEntityTypesCommand { updates: vec![unbinding] })
            .await
            .unwrap();
        handle(&ctx.pool, &admin, delete("validatePlate")).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM plugins").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_plugin_is_noop() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, delete("nope")).await.unwrap();
    }
}
