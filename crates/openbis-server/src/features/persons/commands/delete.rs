//! Delete persons command

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::{ApiError, ApiResult},
    features::{persons, shared::validation::validate_deletion},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletePersonsCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &DeletePersonsCommand) -> ApiResult<()> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;
    require_instance_admin(session, "Deleting persons")?;

    for id in ids {
        let Some(person) = persons::resolve(conn, id).await? else {
            continue;
        };
        if person.id == session.person_id {
            return Err(ApiError::user("You cannot remove your own user"));
        }
        // Registrator references become dangling ids; ownership rows cascade.
        sqlx::query("DELETE FROM persons WHERE id = ?")
            .bind(person.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(user = %person.user_id, reason, "Person deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeletePersonsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-persons",
        &[("PERSON_IDS", command.ids.log_repr()), ("REASON", command.reason.log_repr())],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
