use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_groups, AuthorizationGroup, AuthorizationGroupFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAuthorizationGroupsQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: AuthorizationGroupFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetAuthorizationGroupsQuery,
) -> ApiResult<BTreeMap<String, AuthorizationGroup>> {
    access_log::record(
        &session.user_id,
        "get-authorization-groups",
        &[("AUTHORIZATION_GROUP_IDS", query.ids.log_repr())],
    );

    let wanted: Vec<String> = query.ids.iter().map(|id| id.trim().to_uppercase()).collect();
    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.code))
        .collect();
    let groups = to_groups(&mut conn, rows, &query.fetch_options).await?;
    Ok(groups.into_iter().map(|g| (g.perm_id.clone(), g)).collect())
}
