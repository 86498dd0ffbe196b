use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_materials, Material, MaterialFetchOptions};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{materials::resolve, shared::MaterialPermId},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMaterialsQuery {
    pub ids: Vec<MaterialPermId>,
    #[serde(default)]
    pub fetch_options: MaterialFetchOptions,
}

/// Materials keyed by `CODE (TYPE)`
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetMaterialsQuery,
) -> ApiResult<BTreeMap<String, Material>> {
    access_log::record(&session.user_id, "get-materials", &[("MATERIAL_IDS", query.ids.log_repr())]);

    let mut conn = pool.acquire().await?;
    let mut wanted: Vec<i64> = Vec::new();
    for id in &query.ids {
        if let Some(record) = resolve(&mut conn, id).await? {
            wanted.push(record.id);
        }
    }

    let rows: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.id))
        .collect();
    let materials = to_materials(&mut conn, rows, &query.fetch_options).await?;
    Ok(materials
        .into_iter()
        .map(|material| (material.perm_id.to_string(), material))
        .collect())
}
