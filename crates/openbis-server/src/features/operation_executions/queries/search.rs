use openbis_common::types::{OperationExecutionAvailability, OperationExecutionState};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_executions, OperationExecution, OperationExecutionFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt_value},
        Paging, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationExecutionSearchCriteria {
    pub perm_ids: Option<Vec<String>>,
    pub description: Option<StringMatch>,
    pub state: Option<OperationExecutionState>,
    pub availability: Option<OperationExecutionAvailability>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOperationExecutionsQuery {
    pub criteria: OperationExecutionSearchCriteria,
    pub fetch_options: OperationExecutionFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchOperationExecutionsQuery,
) -> ApiResult<SearchResult<OperationExecution>> {
    access_log::record(
        &session.user_id,
        "search-operation-executions",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn, session).await?;
    drop(conn);

    let matching: Vec<_> = rows
        .into_iter()
        .filter(|row| in_list(&criteria.perm_ids, &row.perm_id))
        .filter(|row| matches_opt_value(&criteria.description, row.description.as_deref()))
        .filter(|row| criteria.state.map_or(true, |state| row.state == state.as_str()))
        .filter(|row| criteria.availability.map_or(true, |a| row.availability == a.as_str()))
        .filter(|row| {
            criteria.owner.as_ref().map_or(true, |owner| {
                row.owner.as_deref().is_some_and(|o| o.eq_ignore_ascii_case(owner))
            })
        })
        .collect();

    let (window, total) = query.paging.apply(matching);
    Ok(SearchResult::new(to_executions(window, &query.fetch_options)?, total))
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

    fn batch(code: &str, description: &str) -> ExecuteOperationsCommand {
        ExecuteOperationsCommand {
            operations: vec![Operation::CreateSpaces(CreateSpacesCommand {
                creations: vec![SpaceCreation {
                    code: code.into(),
                    ..Default::default()
                }],
            })],
            options: ExecutionOptions {
                description: Some(description.into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_search_by_state_and_description() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        for (code, description) in [("S1", "nightly import"), ("S2", "manual fix"), ("CISD", "nightly retry")] {
            let _ = execute::handle(&ctx.pool, &ctx.index, &admin, &ctx.config.executions, batch(code, description)).await;
        }

        let all = handle(&ctx.pool, &admin, SearchOperationExecutionsQuery::default()).await.unwrap();
        assert_eq!(all.total_count, 3);

        let query = SearchOperationExecutionsQuery {
            criteria: OperationExecutionSearchCriteria {
                description: Some(StringMatch::StartsWith("NIGHTLY".into())),
                state: Some(OperationExecutionState::Finished),
                ..Default::default()
            },
            ..Default::default()
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(found.total_count, 1);
        assert_eq!(found.objects[0].description.as_deref(), Some("nightly import"));

        let failed = handle(
            &ctx.pool,
            &admin,
            SearchOperationExecutionsQuery {
                criteria: OperationExecutionSearchCriteria {
                    state: Some(OperationExecutionState::Failed),
                    owner: Some("ADMIN".into()),
                    ..Default::default()
                },
                paging: Paging::new(0, 10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(failed.total_count, 1);
        assert_eq!(failed.objects[0].description.as_deref(), Some("nightly retry"));
    }
}
