use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};

use super::{load_rows, to_data_sets, DataSet, DataSetFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult, features::data_sets::resolve};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDataSetsQuery {
    /// Data set codes
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: DataSetFetchOptions,
}

/// Data sets keyed by perm id
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetDataSetsQuery,
) -> ApiResult<BTreeMap<String, DataSet>> {
    access_log::record(&session.user_id, "get-data-sets", &[("DATA_SET_IDS", query.ids.log_repr())]);

    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let mut wanted: Vec<i64> = Vec::new();
    for id in &query.ids {
        let Some(record) = resolve(&mut conn, id).await? else {
            continue;
        };
        if scope.allows(record.space_id, record.project_id) && !wanted.contains(&record.id) {
            wanted.push(record.id);
        }
    }

    let rows: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.id))
        .collect();
    let data_sets = to_data_sets(&mut conn, rows, &query.fetch_options).await?;
    let by_code: HashMap<String, DataSet> = data_sets
        .into_iter()
        .map(|data_set| (data_set.perm_id.clone(), data_set))
        .collect();

    Ok(by_code.into_iter().collect())
}
