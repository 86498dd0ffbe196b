use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_spaces, Space, SpaceFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt, matches_opt_value},
        Paging, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceSearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub description: Option<StringMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpacesQuery {
    pub criteria: SpaceSearchCriteria,
    pub fetch_options: SpaceFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchSpacesQuery,
) -> ApiResult<SearchResult<Space>> {
    access_log::record(
        &session.user_id,
        "search-spaces",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| scope.allows_space(row.id))
        .filter(|row| in_list(&criteria.codes, &row.code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt_value(&criteria.description, row.description.as_deref()))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let spaces = to_spaces(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(spaces, total))
}
