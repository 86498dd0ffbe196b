use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_spaces, Space, SpaceFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSpacesQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: SpaceFetchOptions,
}

/// Spaces by code. Unknown and unreadable codes are left out.
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetSpacesQuery,
) -> ApiResult<BTreeMap<String, Space>> {
    access_log::record(&session.user_id, "get-spaces", &[("SPACE_IDS", query.ids.log_repr())]);

    let wanted: Vec<String> = query.ids.iter().map(|id| id.trim().to_uppercase()).collect();
    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.code) && scope.allows_space(row.id))
        .collect();

    let spaces = to_spaces(&mut conn, rows, &query.fetch_options).await?;
    Ok(spaces
        .into_iter()
        .map(|space| (space.perm_id.clone(), space))
        .collect())
}
