use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_property_types, PropertyType, PropertyTypeFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPropertyTypesQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: PropertyTypeFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetPropertyTypesQuery,
) -> ApiResult<BTreeMap<String, PropertyType>> {
    access_log::record(&session.user_id, "get-property-types", &[("PROPERTY_TYPE_IDS", query.ids.log_repr())]);

    let wanted: Vec<String> = query.ids.iter().map(|id| id.trim().to_uppercase()).collect();
    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.code))
        .collect();
    let types = to_property_types(&mut conn, rows, &query.fetch_options).await?;
    Ok(types.into_iter().map(|t| (t.perm_id.clone(), t)).collect())
}
