//! Confirm deletions command
//!
//! Purges every object parked in the deletions. Unknown ids are skipped.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{deletions, shared::trash},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmDeletionsCommand {
    pub ids: Option<Vec<i64>>,
}

/// Returns the number of purged objects
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &ConfirmDeletionsCommand,
) -> ApiResult<usize> {
    let ids = command
        .ids
        .as_deref()
        .ok_or_else(|| ApiError::user("Deletion ids cannot be null"))?;

    let mut purged = 0;
    for id in ids {
        let Some(deletion) = deletions::resolve(conn, *id).await? else {
            continue;
        };
        deletion.authorize(session)?;
        purged += trash::purge(conn, deletion.id).await?;
    }
    Ok(purged)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: ConfirmDeletionsCommand) -> ApiResult<usize> {
    access_log::record(
        &session.user_id,
        "confirm-deletions",
        &[("DELETION_IDS", command.ids.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let purged = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(purged)
}
