pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::{OperationExecutionAvailability, OperationExecutionState};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{auth::Session, error::ApiResult, features::shared::fetch::Fetched};

pub use get::GetOperationExecutionsQuery;
pub use search::{OperationExecutionSearchCriteria, SearchOperationExecutionsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationExecutionFetchOptions {
    pub summary: bool,
    pub details: bool,
}

/// Human readable part of an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub operations: Vec<String>,
    pub progress: Option<String>,
    pub error: Option<String>,
    pub results: Vec<String>,
}

/// Full JSON of the operations, their results and the error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDetails {
    pub operations: Vec<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub results: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationExecution {
    pub perm_id: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub state: OperationExecutionState,
    pub availability: OperationExecutionAvailability,
    pub availability_time: i64,
    pub summary_availability: OperationExecutionAvailability,
    pub summary_availability_time: i64,
    pub details_availability: OperationExecutionAvailability,
    pub details_availability_time: i64,
    pub creation_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub finish_date: Option<DateTime<Utc>>,
    /// `None` once the summary timed out or was deleted
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub summary: Fetched<Option<ExecutionSummary>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub details: Fetched<Option<ExecutionDetails>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ExecutionRow {
    pub perm_id: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub state: String,
    pub availability: String,
    pub availability_time: i64,
    pub summary_availability: String,
    pub summary_availability_time: i64,
    pub details_availability: String,
    pub details_availability_time: i64,
    pub summary_operations: Option<String>,
    pub summary_progress: Option<String>,
    pub summary_error: Option<String>,
    pub summary_results: Option<String>,
    pub details_operations: Option<String>,
    pub details_error: Option<String>,
    pub details_results: Option<String>,
    pub creation_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub finish_date: Option<DateTime<Utc>>,
}

/// Executions owned by the caller, or all of them for instance admins
pub(crate) async fn load_rows(conn: &mut SqliteConnection, session: &Session) -> ApiResult<Vec<ExecutionRow>> {
    let rows = sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT e.perm_id, p.user_id AS owner, e.description, e.state,
               e.availability, e.availability_time,
               e.summary_availability, e.summary_availability_time,
               e.details_availability, e.details_availability_time,
               e.summary_operations, e.summary_progress, e.summary_error, e.summary_results,
               e.details_operations, e.details_error, e.details_results,
               e.creation_date, e.start_date, e.finish_date
        FROM operation_executions e
        LEFT JOIN persons p ON p.id = e.owner_id
        WHERE e.owner_id = ? OR ?
        ORDER BY e.id
        "#,
    )
    .bind(session.person_id)
    .bind(session.is_instance_admin())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

fn parse_list<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> ApiResult<Vec<T>> {
    match raw {
        Some(json) => Ok(serde_json::from_str(json)?),
        None => Ok(Vec::new()),
    }
}

fn ended(availability: OperationExecutionAvailability) -> bool {
    matches!(
        availability,
        OperationExecutionAvailability::TimedOut | OperationExecutionAvailability::Deleted
    )
}

fn to_summary(row: &ExecutionRow, availability: OperationExecutionAvailability) -> ApiResult<Option<ExecutionSummary>> {
    if ended(availability) {
        return Ok(None);
    }
    Ok(Some(ExecutionSummary {
        operations: parse_list(row.summary_operations.as_deref())?,
        progress: row.summary_progress.clone(),
        error: row.summary_error.clone(),
        results: parse_list(row.summary_results.as_deref())?,
    }))
}

fn to_details(row: &ExecutionRow, availability: OperationExecutionAvailability) -> ApiResult<Option<ExecutionDetails>> {
    if ended(availability) {
        return Ok(None);
    }
    let error = match row.details_error.as_deref() {
        Some(json) => Some(serde_json::from_str(json)?),
        None => None,
    };
    Ok(Some(ExecutionDetails {
        operations: parse_list(row.details_operations.as_deref())?,
        error,
        results: parse_list(row.details_results.as_deref())?,
    }))
}

pub(crate) fn to_executions(
    rows: Vec<ExecutionRow>,
    fetch: &OperationExecutionFetchOptions,
) -> ApiResult<Vec<OperationExecution>> {
    rows.into_iter()
        .map(|row| {
            let summary_availability: OperationExecutionAvailability = row.summary_availability.parse()?;
            let details_availability: OperationExecutionAvailability = row.details_availability.parse()?;
            let summary = if fetch.summary {
                Fetched::Value(to_summary(&row, summary_availability)?)
            } else {
                Fetched::NotFetched
            };
            let details = if fetch.details {
                Fetched::Value(to_details(&row, details_availability)?)
            } else {
                Fetched::NotFetched
            };
            Ok(OperationExecution {
                state: row.state.parse()?,
                availability: row.availability.parse()?,
                availability_time: row.availability_time,
                summary_availability,
                summary_availability_time: row.summary_availability_time,
                details_availability,
                details_availability_time: row.details_availability_time,
                summary,
                details,
                perm_id: row.perm_id,
                owner: row.owner,
                description: row.description,
                creation_date: row.creation_date,
                start_date: row.start_date,
                finish_date: row.finish_date,
            })
        })
        .collect()
}
