use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_members, load_rows, to_groups, AuthorizationGroup, AuthorizationGroupFetchOptions};
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
pub struct AuthorizationGroupSearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub description: Option<StringMatch>,
    /// Groups having this member
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchAuthorizationGroupsQuery {
    pub criteria: AuthorizationGroupSearchCriteria,
    pub fetch_options: AuthorizationGroupFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchAuthorizationGroupsQuery,
) -> ApiResult<SearchResult<AuthorizationGroup>> {
    access_log::record(
        &session.user_id,
        "search-authorization-groups",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let members = match &criteria.user_id {
        Some(_) => load_members(&mut conn).await?,
        None => Default::default(),
    };
    let rows: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.codes, &row.code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt_value(&criteria.description, row.description.as_deref()))
        .filter(|row| {
            criteria.user_id.as_ref().map_or(true, |user_id| {
                members
                    .get(&row.id)
                    .is_some_and(|users| users.iter().any(|u| u == user_id.trim()))
            })
        })
        .collect();

    let (window, total) = query.paging.apply(rows);
    let groups = to_groups(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(groups, total))
}
