use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};

use super::{load_rows, to_projects, Project, ProjectFetchOptions};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{projects::resolve, shared::EntityRef},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetProjectsQuery {
    pub ids: Vec<EntityRef>,
    #[serde(default)]
    pub fetch_options: ProjectFetchOptions,
}

/// Projects keyed by the perm id or identifier they were requested with
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetProjectsQuery,
) -> ApiResult<BTreeMap<String, Project>> {
    access_log::record(&session.user_id, "get-projects", &[("PROJECT_IDS", query.ids.log_repr())]);

    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let mut keyed: Vec<(String, i64)> = Vec::new();
    for id in &query.ids {
        let Some(record) = resolve(&mut conn, id).await? else {
            continue;
        };
        if !scope.allows(Some(record.space_id), Some(record.id)) {
            continue;
        }
        let key = match id {
            EntityRef::PermId(_) => record.perm_id.clone(),
            EntityRef::Identifier(_) => record.identifier(),
        };
        keyed.push((key, record.id));
    }

    let rows: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| keyed.iter().any(|(_, id)| *id == row.id))
        .collect();
    let row_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let projects = to_projects(&mut conn, rows, &query.fetch_options).await?;
    let by_id: HashMap<i64, Project> = row_ids.into_iter().zip(projects).collect();

    Ok(keyed
        .into_iter()
        .filter_map(|(key, id)| by_id.get(&id).map(|project| (key, project.clone())))
        .collect())
}
