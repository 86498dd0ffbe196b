use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_queries, Query, QueryFetchOptions};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::queries::QueryDatabases,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetQueriesQuery {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub fetch_options: QueryFetchOptions,
}

/// Queries keyed by technical id; unknown and private foreign ids are omitted
#[tracing::instrument(skip_all, fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    databases: &QueryDatabases,
    query: GetQueriesQuery,
) -> ApiResult<BTreeMap<i64, Query>> {
    access_log::record(&session.user_id, "get-queries", &[("QUERY_IDS", query.ids.log_repr())]);

    let mut conn = pool.acquire().await?;
    let rows: Vec<_> = load_rows(&mut conn, session)
        .await?
        .into_iter()
        .filter(|row| query.ids.contains(&row.id))
        .collect();
    let found = to_queries(rows, databases, &query.fetch_options)?;
    Ok(found.into_iter().map(|q| (q.id, q)).collect())
}
