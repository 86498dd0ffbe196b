use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_projects, Project, ProjectFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt},
        Paging, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSearchCriteria {
    pub perm_ids: Option<Vec<String>>,
    pub identifiers: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    /// Code of the owning space
    pub space: Option<StringMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchProjectsQuery {
    pub criteria: ProjectSearchCriteria,
    pub fetch_options: ProjectFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchProjectsQuery,
) -> ApiResult<SearchResult<Project>> {
    access_log::record(
        &session.user_id,
        "search-projects",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| scope.allows(Some(row.space_id), Some(row.id)))
        .filter(|row| in_list(&criteria.perm_ids, &row.perm_id))
        .filter(|row| in_list(&criteria.identifiers, &row.identifier()))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt(&criteria.space, &row.space_code))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let projects = to_projects(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(projects, total))
}
