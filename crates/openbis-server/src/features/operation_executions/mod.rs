//! Batched operation executions
//!
//! A batch of operations runs in one transaction, either while the caller
//! waits or in a spawned task. Every batch is recorded as an execution with
//! a short summary (operation descriptions, progress, error, result
//! descriptions) and full details (operations, error and results as JSON).
//!
//! The execution itself, its summary and its details each carry an
//! availability:
//!
//! ```text
//! AVAILABLE --(time elapsed)--> TIME_OUT_PENDING --(sweep)--> TIMED_OUT
//! AVAILABLE --(delete)--------> DELETE_PENDING   --(sweep)--> DELETED
//! ```
//!
//! The [`maintenance`] tasks drive the transitions; an execution whose own
//! availability ends is removed, a summary or details part whose
//! availability ends is cleared.

pub mod commands;
pub mod maintenance;
pub mod operations;
pub mod queries;
pub mod routes;

use chrono::{DateTime, Utc};
use openbis_common::types::{OperationExecutionAvailability, OperationExecutionState};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
};

pub use commands::{
    DeleteOperationExecutionsCommand, ExecuteOperationsCommand, ExecutionOptions, ExecutionResults,
    OperationExecutionUpdate, UpdateOperationExecutionsCommand,
};
pub use operations::Operation;
pub use queries::{
    GetOperationExecutionsQuery, OperationExecution, OperationExecutionFetchOptions,
    OperationExecutionSearchCriteria, SearchOperationExecutionsQuery,
};
pub use routes::operation_executions_routes;

#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRecord {
    pub id: i64,
    pub perm_id: String,
    pub owner_id: i64,
    pub state: String,
    pub availability: String,
    pub summary_availability: String,
    pub details_availability: String,
    pub finish_date: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub fn state(&self) -> ApiResult<OperationExecutionState> {
        Ok(self.state.parse()?)
    }

    pub fn availability(&self) -> ApiResult<OperationExecutionAvailability> {
        Ok(self.availability.parse()?)
    }

    /// Owners and instance admins may see and change an execution
    pub fn visible_to(&self, session: &Session) -> bool {
        self.owner_id == session.person_id || session.is_instance_admin()
    }

    pub fn authorize(&self, session: &Session) -> ApiResult<()> {
        if self.visible_to(session) {
            Ok(())
        } else {
            Err(ApiError::unauthorized("OperationExecutionPermId", &self.perm_id))
        }
    }
}

const RECORD_COLUMNS: &str =
    "id, perm_id, owner_id, state, availability, summary_availability, details_availability, finish_date";

pub async fn resolve(conn: &mut SqliteConnection, perm_id: &str) -> ApiResult<Option<ExecutionRecord>> {
    let sql = format!("SELECT {} FROM operation_executions WHERE perm_id = ?", RECORD_COLUMNS);
    let record = sqlx::query_as::<_, ExecutionRecord>(&sql)
        .bind(perm_id.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, perm_id: &str) -> ApiResult<ExecutionRecord> {
    resolve(conn, perm_id)
        .await?
        .ok_or_else(|| ApiError::not_found("OperationExecutionPermId", perm_id.trim()))
}
