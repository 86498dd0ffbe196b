//! Update operation executions command
//!
//! Changes the description and lets the owner drop the summary or the
//! details of an execution ahead of their availability time.

use openbis_common::types::OperationExecutionAvailability;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{
        operation_executions,
        shared::{updates::present, validation::blank_to_none},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationExecutionUpdate {
    pub execution_id: String,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub delete_summary: bool,
    pub delete_details: bool,
}

impl OperationExecutionUpdate {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            ..Self::default()
        }
    }
}

crate::struct_log_repr!(OperationExecutionUpdate, "OperationExecutionUpdate", "executionId" => execution_id);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOperationExecutionsCommand {
    pub updates: Vec<OperationExecutionUpdate>,
}

/// Flag one availability column for deletion unless it already ended
async fn request_part_deletion(conn: &mut SqliteConnection, id: i64, column: &str) -> ApiResult<()> {
    let sql = format!(
        "UPDATE operation_executions SET {column} = ? WHERE id = ? AND {column} IN (?, ?)",
        column = column
    );
    sqlx::query(&sql)
        .bind(OperationExecutionAvailability::DeletePending.as_str())
        .bind(id)
        .bind(OperationExecutionAvailability::Available.as_str())
        .bind(OperationExecutionAvailability::TimeOutPending.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateOperationExecutionsCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let record = operation_executions::require(conn, &update.execution_id).await?;
        record.authorize(session)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE operation_executions SET description = ? WHERE id = ?")
                .bind(blank_to_none(description.clone()))
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
        if update.delete_summary {
            request_part_deletion(conn, record.id, "summary_availability").await?;
        }
        if update.delete_details {
            request_part_deletion(conn, record.id, "details_availability").await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateOperationExecutionsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "update-operation-executions",
        &[("EXECUTION_UPDATES", command.updates.log_repr())],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
