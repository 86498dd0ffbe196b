//! Delete operation executions command
//!
//! Deletion only flags the execution; the maintenance sweep removes it.

use openbis_common::types::OperationExecutionAvailability;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{operation_executions, shared::validation::validate_deletion},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteOperationExecutionsCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteOperationExecutionsCommand,
) -> ApiResult<usize> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;
    let mut flagged = 0;
    for perm_id in ids {
        let Some(record) = operation_executions::resolve(conn, perm_id).await? else {
            continue;
        };
        record.authorize(session)?;
        let result = sqlx::query("UPDATE operation_executions SET availability = ? WHERE id = ? AND availability IN (?, ?)")
            .bind(OperationExecutionAvailability::DeletePending.as_str())
            .bind(record.id)
            .bind(OperationExecutionAvailability::Available.as_str())
            .bind(OperationExecutionAvailability::TimeOutPending.as_str())
            .execute(&mut *conn)
            .await?;
        flagged += result.rows_affected() as usize;
        tracing::info!(execution = %record.perm_id, reason, "Operation execution marked for deletion");
    }
    Ok(flagged)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteOperationExecutionsCommand) -> ApiResult<usize> {
    access_log::record(
        &session.user_id,
        "delete-operation-executions",
        &[("EXECUTION_IDS", command.ids.log_repr()), ("REASON", command.reason.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let flagged = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(flagged)
}
