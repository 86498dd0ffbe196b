//! Background sweeps over the availabilities of operation executions
//!
//! Two tasks run on their own intervals until the shutdown token fires:
//! one flags availabilities whose time has elapsed, the other finishes
//! pending timeouts and deletions. Executions a previous process left
//! unfinished are failed at startup so that they age out like any other.

use chrono::{DateTime, Utc};
use openbis_common::types::{OperationExecutionAvailability as Availability, OperationExecutionState as State};
use sqlx::{FromRow, SqlitePool};
use std::{future::Future, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::MaintenanceConfig,
    error::{ApiError, ApiResult},
};

/// Availability column, its time column and the content it guards
struct Part {
    availability: &'static str,
    time: &'static str,
    content: &'static [&'static str],
}

const SUMMARY: Part = Part {
    availability: "summary_availability",
    time: "summary_availability_time",
    content: &["summary_operations", "summary_progress", "summary_error", "summary_results"],
};

const DETAILS: Part = Part {
    availability: "details_availability",
    time: "details_availability_time",
    content: &["details_operations", "details_error", "details_results"],
};

const EXECUTION: Part = Part {
    availability: "availability",
    time: "availability_time",
    content: &[],
};

#[derive(FromRow)]
struct Candidate {
    id: i64,
    finish_date: DateTime<Utc>,
    seconds: i64,
}

/// Flag every AVAILABLE part whose availability time has elapsed since the
/// execution finished. Returns the number of parts flagged.
pub async fn mark_timeout_pending(pool: &SqlitePool, now: DateTime<Utc>) -> ApiResult<usize> {
    let mut flagged = 0;
    let mut tx = pool.begin().await?;
    for part in [&EXECUTION, &SUMMARY, &DETAILS] {
        let sql = format!(
            "SELECT id, finish_date, {time} AS seconds FROM operation_executions \
             WHERE {availability} = ? AND finish_date IS NOT NULL",
            time = part.time,
            availability = part.availability
        );
        let candidates = sqlx::query_as::<_, Candidate>(&sql)
            .bind(Availability::Available.as_str())
            .fetch_all(&mut *tx)
            .await?;

        let update = format!(
            "UPDATE operation_executions SET {} = ? WHERE id = ?",
            part.availability
        );
        for candidate in candidates {
            if (now - candidate.finish_date).num_seconds() < candidate.seconds {
                continue;
            }
            sqlx::query(&update)
                .bind(Availability::TimeOutPending.as_str())
                .bind(candidate.id)
                .execute(&mut *tx)
                .await?;
            flagged += 1;
        }
    }
    tx.commit().await?;

    if flagged > 0 {
        tracing::info!(parts = flagged, "Operation execution availabilities timed out");
    }
    Ok(flagged)
}

/// Finish pending timeouts and deletions. Executions whose own availability
/// ends are removed; summaries and details are cleared. Returns the number
/// of parts that reached TIMED_OUT or DELETED.
pub async fn mark_timed_out_or_deleted(pool: &SqlitePool) -> ApiResult<usize> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM operation_executions WHERE availability IN (?, ?)")
        .bind(Availability::TimeOutPending.as_str())
        .bind(Availability::DeletePending.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected() as usize;

    let mut cleared = 0;
    for part in [&SUMMARY, &DETAILS] {
        let clear: Vec<String> = part.content.iter().map(|column| format!("{} = NULL", column)).collect();
        let sql = format!(
            "UPDATE operation_executions SET {availability} = ?, {clear} WHERE {availability} = ?",
            availability = part.availability,
            clear = clear.join(", ")
        );
        for (pending, ended) in [
            (Availability::TimeOutPending, Availability::TimedOut),
            (Availability::DeletePending, Availability::Deleted),
        ] {
            cleared += sqlx::query(&sql)
                .bind(ended.as_str())
                .bind(pending.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected() as usize;
        }
    }
    tx.commit().await?;

    if removed + cleared > 0 {
        tracing::info!(removed, cleared, "Operation execution sweep finished");
    }
    Ok(removed + cleared)
}

/// Fail every execution still SCHEDULED or RUNNING. Run once at startup,
/// before any new execution is accepted. Returns the number of executions
/// failed.
pub async fn recover_interrupted(pool: &SqlitePool) -> ApiResult<usize> {
    let error = ApiError::Internal("Execution interrupted by a server shutdown".to_string());
    let details = serde_json::json!({
        "code": error.kind().as_str(),
        "message": error.to_string(),
        "operation_index": null,
    });
    let recovered = sqlx::query(
        r#"
        UPDATE operation_executions
        SET state = ?, finish_date = ?, summary_error = ?, details_error = ?
        WHERE state IN (?, ?, ?)
        "#,
    )
    .bind(State::Failed.as_str())
    .bind(Utc::now())
    .bind(error.to_string())
    .bind(details.to_string())
    .bind(State::New.as_str())
    .bind(State::Scheduled.as_str())
    .bind(State::Running.as_str())
    .execute(pool)
    .await?
    .rows_affected() as usize;

    if recovered > 0 {
        tracing::warn!(executions = recovered, "Failed operation executions interrupted by a shutdown");
    }
    Ok(recovered)
}

fn spawn_loop<F, Fut>(name: &'static str, every: Duration, cancel: CancellationToken, task: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ApiResult<usize>> + Send,
{
    tokio::spawn(async move {
        tracing::info!(task = name, interval_secs = every.as_secs(), "Maintenance task started");
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = task().await {
                        tracing::error!(task = name, error = %e, "Maintenance task failed");
                    }
                },
            }
        }
        tracing::info!(task = name, "Maintenance task stopped");
    })
}

/// Start both sweeps; they stop when `cancel` fires
pub fn spawn(pool: &SqlitePool, config: &MaintenanceConfig, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Operation execution maintenance disabled");
        return Vec::new();
    }

    let timeout_pool = pool.clone();
    let sweep_pool = pool.clone();
    vec![
        spawn_loop(
            "mark-timeout-pending",
            Duration::from_secs(config.timeout_pending_interval_secs.max(1)),
            cancel.clone(),
            move || {
                let pool = timeout_pool.clone();
                async move { mark_timeout_pending(&pool, Utc::now()).await }
            },
        ),
        spawn_loop(
            "mark-timed-out-or-deleted",
            Duration::from_secs(config.timed_out_or_deleted_interval_secs.max(1)),
            cancel,
            move || {
                let pool = sweep_pool.clone();
                async move { mark_timed_out_or_deleted(&pool).await }
            },
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        operation_executions::{
            commands::execute::{self, ExecuteOperationsCommand, ExecutionOptions},
            Operation,
        },
        shared::test_helpers::TestContext,
        spaces::{CreateSpacesCommand, SpaceCreation},
    };
    use chrono::Duration as ChronoDuration;

    async fn run_batch(ctx: &TestContext, options: ExecutionOptions) -> String {
        let admin = ctx.admin().await;
        let command = ExecuteOperationsCommand {
            operations: vec![Operation::CreateSpaces(CreateSpacesCommand {
                creations: vec![SpaceCreation {
                    code: format!("M{}", ctx.count("SELECT COUNT(*) FROM operation_executions").await),
                    ..Default::default()
                }],
            })],
            options,
        };
        execute::handle(&ctx.pool, &ctx.index, &admin, &ctx.config.executions, command)
            .await
            .unwrap()
            .execution_id()
            .to_string()
    }

    async fn availabilities(ctx: &TestContext, perm_id: &str) -> Option<(String, String, String)> {
        sqlx::query_as(
            "SELECT availability, summary_availability, details_availability FROM operation_executions WHERE perm_id = ?",
        )
        .bind(perm_id)
        .fetch_optional(&ctx.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_parts_time_out_independently() {
        let ctx = TestContext::new().await;
        let perm_id = run_batch(
            &ctx,
            ExecutionOptions {
                availability_time: Some(3600),
                summary_availability_time: Some(60),
                details_availability_time: Some(0),
                ..Default::default()
            },
        )
        .await;

        let flagged = mark_timeout_pending(&ctx.pool, Utc::now()).await.unwrap();
        assert_eq!(flagged, 1);
        assert_eq!(
            availabilities(&ctx, &perm_id).await.unwrap(),
            ("AVAILABLE".into(), "AVAILABLE".into(), "TIME_OUT_PENDING".into())
        );

        let later = Utc::now() + ChronoDuration::seconds(120);
        assert_eq!(mark_timeout_pending(&ctx.pool, later).await.unwrap(), 1);

        assert_eq!(mark_timed_out_or_deleted(&ctx.pool).await.unwrap(), 2);
        assert_eq!(
            availabilities(&ctx, &perm_id).await.unwrap(),
            ("AVAILABLE".into(), "TIMED_OUT".into(), "TIMED_OUT".into())
        );
        let cleared: Option<String> =
            sqlx::query_scalar("SELECT summary_operations FROM operation_executions WHERE perm_id = ?")
                .bind(&perm_id)
                .fetch_one(&ctx.pool)
                .await
                .unwrap();
        assert!(cleared.is_none());

        let much_later = Utc::now() + ChronoDuration::seconds(7200);
        assert_eq!(mark_timeout_pending(&ctx.pool, much_later).await.unwrap(), 1);
        mark_timed_out_or_deleted(&ctx.pool).await.unwrap();
        assert!(availabilities(&ctx, &perm_id).await.is_none());
    }

    #[tokio::test]
    async fn test_unfinished_executions_are_kept() {
        let ctx = TestContext::new().await;
        let perm_id = run_batch(
            &ctx,
            ExecutionOptions {
                availability_time: Some(0),
                ..Default::default()
            },
        )
        .await;
        sqlx::query("UPDATE operation_executions SET finish_date = NULL, state = 'RUNNING'")
            .execute(&ctx.pool)
            .await
            .unwrap();

        assert_eq!(mark_timeout_pending(&ctx.pool, Utc::now()).await.unwrap(), 0);
        assert!(availabilities(&ctx, &perm_id).await.is_some());
    }

    #[tokio::test]
    async fn test_interrupted_executions_fail_and_age_out() {
        let ctx = TestContext::new().await;
        let perm_id = run_batch(
            &ctx,
            ExecutionOptions {
                availability_time: Some(0),
                ..Default::default()
            },
        )
        .await;
        let finished = run_batch(&ctx, ExecutionOptions::default()).await;
        sqlx::query("UPDATE operation_executions SET finish_date = NULL, state = 'RUNNING' WHERE perm_id = ?")
            .bind(&perm_id)
            .execute(&ctx.pool)
            .await
            .unwrap();

        assert_eq!(recover_interrupted(&ctx.pool).await.unwrap(), 1);
        let (state, finish_date, error): (String, Option<DateTime<Utc>>, Option<String>) = sqlx::query_as(
            "SELECT state, finish_date, summary_error FROM operation_executions WHERE perm_id = ?",
        )
        .bind(&perm_id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
        assert_eq!(state, "FAILED");
        assert!(finish_date.is_some());
        assert!(error.unwrap().contains("interrupted"));

        let untouched: String = sqlx::query_scalar("SELECT state FROM operation_executions WHERE perm_id = ?")
            .bind(&finished)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
        assert_eq!(untouched, "FINISHED");
        assert_eq!(recover_interrupted(&ctx.pool).await.unwrap(), 0);

        assert_eq!(mark_timeout_pending(&ctx.pool, Utc::now()).await.unwrap(), 1);
        mark_timed_out_or_deleted(&ctx.pool).await.unwrap();
        assert!(availabilities(&ctx, &perm_id).await.is_none());
    }

    #[tokio::test]
    async fn test_spawned_tasks_sweep_and_stop() {
        let ctx = TestContext::new().await;
        let perm_id = run_batch(
            &ctx,
            ExecutionOptions {
                availability_time: Some(0),
                ..Default::default()
            },
        )
        .await;

        let config = MaintenanceConfig {
            enabled: true,
            timeout_pending_interval_secs: 1,
            timed_out_or_deleted_interval_secs: 1,
        };
        let cancel = CancellationToken::new();
        let handles = spawn(&ctx.pool, &config, cancel.clone());
        assert_eq!(handles.len(), 2);

        let gone = async {
            while availabilities(&ctx, &perm_id).await.is_some() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), gone).await.unwrap();

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let disabled = MaintenanceConfig {
            enabled: false,
            ..config
        };
        assert!(spawn(&ctx.pool, &disabled, CancellationToken::new()).is_empty());
    }
}
