//! Delete stored queries command; queries are removed immediately

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{queries, shared::validation::validate_deletion},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteQueriesCommand {
    pub ids: Option<Vec<i64>>,
    pub reason: Option<String>,
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &DeleteQueriesCommand) -> ApiResult<()> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;
    for id in ids {
        let Some(record) = queries::resolve(conn, *id).await? else {
            continue;
        };
        record.authorize_change(session)?;
        sqlx::query("DELETE FROM queries WHERE id = ?")
            .bind(record.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(query = %record.name, reason, "Query deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteQueriesCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-queries",
        &[("QUERY_IDS", command.ids.log_repr()), ("REASON", command.reason.log_repr())],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
