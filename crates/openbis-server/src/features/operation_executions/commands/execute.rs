//! Execute operations command
//!
//! The batch is registered first, then run in one transaction. A synchronous
//! call returns the results (or the error of the failed operation) directly;
//! an asynchronous one returns the execution perm id right away and the
//! outcome is read from the execution later.

use chrono::Utc;
use openbis_common::types::{OperationExecutionAvailability, OperationExecutionState};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    config::ExecutionConfig,
    db,
    error::{ApiError, ApiResult},
    features::{
        operation_executions::Operation,
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, require_non_empty},
        },
    },
    index::IndexSync,
};

/// How a batch runs and how long its record stays around
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub asynchronous: bool,
    /// Perm id chosen by the client; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Seconds the execution is kept after it finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_availability_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_availability_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteOperationsCommand {
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub options: ExecutionOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionResults {
    Synchronous {
        execution_id: String,
        results: Vec<serde_json::Value>,
    },
    Asynchronous {
        execution_id: String,
    },
}

impl ExecutionResults {
    pub fn execution_id(&self) -> &str {
        match self {
            ExecutionResults::Synchronous { execution_id, .. } | ExecutionResults::Asynchronous { execution_id } => {
                execution_id
            },
        }
    }
}

struct Availabilities {
    main: i64,
    summary: i64,
    details: i64,
}

fn availabilities(options: &ExecutionOptions, defaults: &ExecutionConfig) -> ApiResult<Availabilities> {
    let pick = |value: Option<i64>, default: i64, what: &str| match value {
        Some(secs) if secs < 0 => Err(ApiError::user(format!("{} cannot be negative", what))),
        Some(secs) => Ok(secs),
        None => Ok(default),
    };
    Ok(Availabilities {
        main: pick(options.availability_time, defaults.availability_secs, "Availability time")?,
        summary: pick(
            options.summary_availability_time,
            defaults.summary_availability_secs,
            "Summary availability time",
        )?,
        details: pick(
            options.details_availability_time,
            defaults.details_availability_secs,
            "Details availability time",
        )?,
    })
}

/// Record a new execution in `state`, returning its perm id
async fn register(
    pool: &SqlitePool,
    session: &Session,
    command: &ExecuteOperationsCommand,
    times: &Availabilities,
    state: OperationExecutionState,
) -> ApiResult<String> {
    let descriptions: Vec<String> = command.operations.iter().map(Operation::describe).collect();
    let available = OperationExecutionAvailability::Available.as_str();

    let mut tx = pool.begin().await?;
    let perm_id = match command.options.execution_id.as_deref() {
        Some(id) => require_non_empty(Some(id), "Execution id")?.to_string(),
        None => db::next_perm_id(&mut tx).await?,
    };
    sqlx::query(
        r#"
        INSERT INTO operation_executions (
            perm_id, owner_id, description, state,
            availability, availability_time, summary_availability, summary_availability_time,
            details_availability, details_availability_time,
            summary_operations, details_operations, creation_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&perm_id)
    .bind(session.person_id)
    .bind(blank_to_none(command.options.description.clone()))
    .bind(state.as_str())
    .bind(available)
    .bind(times.main)
    .bind(available)
    .bind(times.summary)
    .bind(available)
    .bind(times.details)
    .bind(serde_json::to_string(&descriptions)?)
    .bind(serde_json::to_string(&command.operations)?)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, || format!("Operation execution '{}' already exists", perm_id)))?;
    tx.commit().await?;
    Ok(perm_id)
}

async fn set_running(pool: &SqlitePool, perm_id: &str) -> ApiResult<()> {
    sqlx::query("UPDATE operation_executions SET state = ?, start_date = ? WHERE perm_id = ?")
        .bind(OperationExecutionState::Running.as_str())
        .bind(Utc::now())
        .bind(perm_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn set_finished(pool: &SqlitePool, perm_id: &str, names: &[&str], results: &[serde_json::Value]) -> ApiResult<()> {
    let descriptions: Vec<String> = names
        .iter()
        .zip(results)
        .map(|(name, result)| format!("{}Result {}", name, result))
        .collect();
    sqlx::query(
        r#"
        UPDATE operation_executions
        SET state = ?, finish_date = ?, summary_progress = ?, summary_results = ?, details_results = ?
        WHERE perm_id = ?
        "#,
    )
    .bind(OperationExecutionState::Finished.as_str())
    .bind(Utc::now())
    .bind(format!("{}/{} operations done", results.len(), names.len()))
    .bind(serde_json::to_string(&descriptions)?)
    .bind(serde_json::to_string(results)?)
    .bind(perm_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn set_failed(pool: &SqlitePool, perm_id: &str, total: usize, failed_at: usize, error: &ApiError) -> ApiResult<()> {
    let details = serde_json::json!({
        "code": error.kind().as_str(),
        "message": error.to_string(),
        "operation_index": failed_at,
    });
    sqlx::query(
        r#"
        UPDATE operation_executions
        SET state = ?, finish_date = ?, summary_progress = ?, summary_error = ?, details_error = ?
        WHERE perm_id = ?
        "#,
    )
    .bind(OperationExecutionState::Failed.as_str())
    .bind(Utc::now())
    .bind(format!("{}/{} operations done", failed_at, total))
    .bind(error.to_string())
    .bind(details.to_string())
    .bind(perm_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Run a registered batch in one transaction and record the outcome
pub async fn run(
    pool: &SqlitePool,
    index: &IndexSync,
    session: &Session,
    perm_id: &str,
    operations: &[Operation],
) -> ApiResult<Vec<serde_json::Value>> {
    set_running(pool, perm_id).await?;

    let outcome: Result<Vec<serde_json::Value>, (usize, ApiError)> = async {
        let mut tx = pool.begin().await.map_err(|e| (0, e.into()))?;
        let mut results = Vec::with_capacity(operations.len());
        for (position, operation) in operations.iter().enumerate() {
            let result = operation.run(&mut tx, session).await.map_err(|e| (position, e))?;
            results.push(result);
        }
        tx.commit().await.map_err(|e| (operations.len(), e.into()))?;
        Ok(results)
    }
    .await;

    let names: Vec<&str> = operations.iter().map(Operation::name).collect();
    match outcome {
        Ok(results) => {
            set_finished(pool, perm_id, &names, &results).await?;
            index.notify();
            tracing::info!(execution = %perm_id, operations = operations.len(), "Operation execution finished");
            Ok(results)
        },
        Err((failed_at, error)) => {
            set_failed(pool, perm_id, operations.len(), failed_at, &error).await?;
            tracing::warn!(
                execution = %perm_id,
                operation = names.get(failed_at).copied().unwrap_or_default(),
                error = %error,
                "Operation execution failed"
            );
            Err(error)
        },
    }
}

#[tracing::instrument(skip_all, fields(user = %session.user_id, count = command.operations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    index: &IndexSync,
    session: &Session,
    defaults: &ExecutionConfig,
    command: ExecuteOperationsCommand,
) -> ApiResult<ExecutionResults> {
    let names: Vec<String> = command.operations.iter().map(|op| op.name().to_string()).collect();
    access_log::record(
        &session.user_id,
        "execute-operations",
        &[
            ("OPERATIONS", names.log_repr()),
            ("ASYNCHRONOUS", command.options.asynchronous.to_string()),
        ],
    );

    let times = availabilities(&command.options, defaults)?;

    if command.options.asynchronous {
        let perm_id = register(pool, session, &command, &times, OperationExecutionState::Scheduled).await?;
        let pool = pool.clone();
        let index = index.clone();
        let session = session.clone();
        let execution_id = perm_id.clone();
        tokio::spawn(async move {
            if let Err(e) = run(&pool, &index, &session, &execution_id, &command.operations).await {
                tracing::debug!(execution = %execution_id, error = %e, "Asynchronous execution ended with an error");
            }
        });
        Ok(ExecutionResults::Asynchronous { execution_id: perm_id })
    } else {
        let perm_id = register(pool, session, &command, &times, OperationExecutionState::New).await?;
        let results = run(pool, index, session, &perm_id, &command.operations).await?;
        Ok(ExecutionResults::Synchronous {
            execution_id: perm_id,
            results,
        })
    }
}
