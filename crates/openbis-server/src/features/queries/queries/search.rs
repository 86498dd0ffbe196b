use openbis_common::types::QueryType;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_queries, Query, QueryFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::{
        queries::QueryDatabases,
        shared::{
            criteria::{in_id_list, matches_opt, matches_opt_value},
            Paging, SearchResult, StringMatch,
        },
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySearchCriteria {
    pub ids: Option<Vec<i64>>,
    pub name: Option<StringMatch>,
    pub description: Option<StringMatch>,
    pub database_id: Option<String>,
    pub query_type: Option<QueryType>,
    pub entity_type_code_pattern: Option<StringMatch>,
    pub sql: Option<StringMatch>,
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQueriesQuery {
    pub criteria: QuerySearchCriteria,
    pub fetch_options: QueryFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip_all, fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    databases: &QueryDatabases,
    query: SearchQueriesQuery,
) -> ApiResult<SearchResult<Query>> {
    access_log::record(
        &session.user_id,
        "search-queries",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn, session)
        .await?
        .into_iter()
        .filter(|row| in_id_list(&criteria.ids, row.id))
        .filter(|row| matches_opt(&criteria.name, &row.name))
        .filter(|row| matches_opt_value(&criteria.description, row.description.as_deref()))
        .filter(|row| matches_opt(&criteria.sql, &row.sql))
        .filter(|row| matches_opt_value(&criteria.entity_type_code_pattern, row.entity_type_code_pattern.as_deref()))
        .filter(|row| {
            criteria
                .database_id
                .as_ref()
                .map_or(true, |key| key.trim() == row.database_key)
        })
        .filter(|row| {
            criteria
                .query_type
                .map_or(true, |query_type| query_type.as_str() == row.query_type)
        })
        .filter(|row| criteria.public.map_or(true, |public| public == row.is_public))
        .collect();

    let (window, total) = query.paging.apply(matching);
    Ok(SearchResult::new(to_queries(window, databases, &query.fetch_options)?, total))
}
