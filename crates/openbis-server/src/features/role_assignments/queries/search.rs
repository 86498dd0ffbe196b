use openbis_common::types::{Role, RoleLevel};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, RoleAssignment, RoleAssignmentFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::{role_assignments::level_of, shared::Paging, shared::SearchResult},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAssignmentSearchCriteria {
    pub user_id: Option<String>,
    pub authorization_group_id: Option<String>,
    pub space_code: Option<String>,
    pub role: Option<Role>,
    pub role_level: Option<RoleLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRoleAssignmentsQuery {
    pub criteria: RoleAssignmentSearchCriteria,
    pub fetch_options: RoleAssignmentFetchOptions,
    pub paging: Paging,
}

fn same(criterion: &Option<String>, value: Option<&str>) -> bool {
    match criterion {
        None => true,
        Some(expected) => value.is_some_and(|v| v.eq_ignore_ascii_case(expected.trim())),
    }
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchRoleAssignmentsQuery,
) -> ApiResult<SearchResult<RoleAssignment>> {
    access_log::record(
        &session.user_id,
        "search-role-assignments",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let matching: Vec<RoleAssignment> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| row.readable(&scope))
        .filter(|row| same(&criteria.user_id, row.user_id.as_deref()))
        .filter(|row| same(&criteria.authorization_group_id, row.group_code.as_deref()))
        .filter(|row| {
            same(
                &criteria.space_code,
                row.space_code.as_deref().or(row.project_space_code.as_deref()),
            )
        })
        .filter(|row| criteria.role.map_or(true, |role| row.role == role.as_str()))
        .filter(|row| {
            criteria
                .role_level
                .map_or(true, |level| level_of(row.space_id, row.project_id) == level)
        })
        .map(|row| row.into_assignment(&query.fetch_options))
        .collect::<ApiResult<_>>()?;

    let (window, total) = query.paging.apply(matching);
    Ok(SearchResult::new(window, total))
}
