use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::shared::validation::require_non_empty,
};

/// The data type and references of a property type are fixed once created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyTypeUpdate {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePropertyTypesCommand {
    pub updates: Vec<PropertyTypeUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdatePropertyTypesCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let code = update.type_id.trim().to_uppercase();
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM property_types WHERE code = ?")
            .bind(&code)
            .fetch_optional(&mut *conn)
            .await?;
        let id = id.ok_or_else(|| ApiError::not_found("PropertyTypePermId", &code))?;
        require_instance_admin_for(session, "PropertyTypePermId", &code)?;

        if let Some(label) = &update.label {
            sqlx::query("UPDATE property_types SET label = ? WHERE id = ?")
                .bind(require_non_empty(Some(label), "Label")?)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(description) = &update.description {
            sqlx::query("UPDATE property_types SET description = ? WHERE id = ?")
                .bind(require_non_empty(Some(description), "Description")?)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdatePropertyTypesCommand) -> ApiResult<()> {
    let ids: Vec<&str> = command.updates.iter().map(|u| u.type_id.as_str()).collect();
    access_log::record(&session.user_id, "update-property-types", &[("PROPERTY_TYPE_UPDATES", format!("{:?}", ids))]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::TestContext;

    #[tokio::test]
    async fn test_blank_label_rejected() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = UpdatePropertyTypesCommand {
            updates: vec![PropertyTypeUpdate {
                type_id: "SIZE".into(),
                label: Some(" ".into()),
                description: None,
            }],
        };
        assert!(handle(&ctx.pool, &admin, command).await.is_err());
    }
}
