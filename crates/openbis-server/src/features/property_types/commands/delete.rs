//! Delete property types command
//!
//! A property type still assigned to an entity type is being used; unassign
//! it first.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::shared::validation::validate_deletion,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletePropertyTypesCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeletePropertyTypesCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        let code = id.trim().to_uppercase();
        require_instance_admin_for(session, "PropertyTypePermId", &code)?;
        let property_type_id: Option<i64> = sqlx::query_scalar("SELECT id FROM property_types WHERE code = ?")
            .bind(&code)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(property_type_id) = property_type_id else {
            continue;
        };

        let assigned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM property_assignments WHERE property_type_id = ?")
            .bind(property_type_id)
            .fetch_one(&mut *conn)
            .await?;
        if assigned > 0 {
            return Err(ApiError::being_used(format!("Property type '{}'", code)));
        }

        sqlx::query("DELETE FROM property_types WHERE id = ?")
            .bind(property_type_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeletePropertyTypesCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-property-types",
        &[
            ("PROPERTY_TYPE_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
