//! Delete external data management systems command
//!
//! A system still holding content copies is being used.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{external_dms::resolve, shared::validation::validate_deletion},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteExternalDmsCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteExternalDmsCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        require_instance_admin_for(session, "ExternalDmsPermId", id.trim().to_uppercase())?;
        let Some(record) = resolve(conn, id).await? else {
            continue;
        };

        let copies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_copies WHERE external_dms_id = ?")
            .bind(record.id)
            .fetch_one(&mut *conn)
            .await?;
        if copies > 0 {
            return Err(ApiError::being_used(format!("External DMS '{}'", record.code)));
        }

        sqlx::query("DELETE FROM external_dms WHERE id = ?")
            .bind(record.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteExternalDmsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-external-data-management-systems",
        &[
            ("EXTERNAL_DMS_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
