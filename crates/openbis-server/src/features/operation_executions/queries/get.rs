use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_executions, OperationExecution, OperationExecutionFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetOperationExecutionsQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: OperationExecutionFetchOptions,
}

/// Executions keyed by perm id; unknown and foreign ids are omitted
#[tracing::instrument(skip_all, fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetOperationExecutionsQuery,
) -> ApiResult<BTreeMap<String, OperationExecution>> {
    access_log::record(
        &session.user_id,
        "get-operation-executions",
        &[("EXECUTION_IDS", query.ids.log_repr())],
    );

    let mut conn = pool.acquire().await?;
    let rows: Vec<_> = load_rows(&mut conn, session)
        .await?
        .into_iter()
        .filter(|row| query.ids.iter().any(|id| id.trim() == row.perm_id))
        .collect();
    let found = to_executions(rows, &query.fetch_options)?;
    Ok(found.into_iter().map(|e| (e.perm_id.clone(), e)).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::ApiError,
        features::{
            operation_executions::{
                commands::execute::{self, ExecuteOperationsCommand, ExecutionOptions},
                Operation,
            },
            shared::test_helpers::{TestContext, SPACE_USER},
            spaces::{CreateSpacesCommand, SpaceCreation},
        },
    };
    use openbis_common::types::{OperationExecutionAvailability, OperationExecutionState};

    #[tokio::test]
    async fn test_get_with_summary_and_details() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = ExecuteOperationsCommand {
            operations: vec![Operation::CreateSpaces(CreateSpacesCommand {
                creations: vec![
                    SpaceCreation {
                        code: "G1".into(),
                        ..Default::default()
                    },
                    SpaceCreation {
                        code: "G2".into(),
                        ..Default::default()
                    },
                ],
            })],
            options: ExecutionOptions {
                description: Some("two spaces".into()),
                summary_availability_time: Some(60),
                ..Default::default()
            },
        };
        let perm_id = execute::handle(&ctx.pool, &ctx.index, &admin, &ctx.config.executions, command)
            .await
            .unwrap()
            .execution_id()
            .to_string();

        let query = GetOperationExecutionsQuery {
            ids: vec![perm_id.clone(), "UNKNOWN".into()],
            fetch_options: OperationExecutionFetchOptions {
                summary: true,
                details: true,
            },
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(found.len(), 1);
        let execution = &found[&perm_id];
        assert_eq!(execution.owner.as_deref(), Some("admin"));
        assert_eq!(execution.description.as_deref(), Some("two spaces"));
        assert_eq!(execution.state, OperationExecutionState::Finished);
        assert_eq!(execution.availability, OperationExecutionAvailability::Available);
        assert_eq!(execution.summary_availability_time, 60);
        assert!(execution.start_date.is_some() && execution.finish_date.is_some());

        let summary = execution.summary.get("Summary").unwrap().as_ref().unwrap();
        assert_eq!(summary.operations, vec!["CreateSpacesOperation 2 item(s)"]);
        assert_eq!(summary.progress.as_deref(), Some("1/1 operations done"));
        assert_eq!(summary.results, vec![r#"CreateSpacesOperationResult ["G1","G2"]"#]);
        assert!(summary.error.is_none());

        let details = execution.details.get("Details").unwrap().as_ref().unwrap();
        assert_eq!(details.operations[0]["type"], "CreateSpaces");
        assert_eq!(details.results, vec![serde_json::json!(["G1", "G2"])]);

        let plain = handle(
            &ctx.pool,
            &admin,
            GetOperationExecutionsQuery {
                ids: vec![perm_id.clone()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(matches!(plain[&perm_id].summary.get("Summary"), Err(ApiError::NotFetched(_))));

        let user = ctx.session(SPACE_USER).await;
        let hidden = handle(
            &ctx.pool,
            &user,
            GetOperationExecutionsQuery {
                ids: vec![perm_id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(hidden.is_empty());
    }
}
