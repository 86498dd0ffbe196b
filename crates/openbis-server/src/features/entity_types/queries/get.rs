use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_entity_types, EntityType, EntityTypeFetchOptions};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::entity_types::EntityKindSpec,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetEntityTypesQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: EntityTypeFetchOptions,
}

/// Types of kind `S` by code; every authenticated user may read them
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, kind = %S::KIND))]
pub async fn handle<S: EntityKindSpec>(
    pool: &SqlitePool,
    session: &Session,
    query: GetEntityTypesQuery,
) -> ApiResult<BTreeMap<String, EntityType<S::Attributes>>> {
    access_log::record(
        &session.user_id,
        &format!("get-{}", S::operation_noun()),
        &[("ENTITY_TYPE_IDS", query.ids.log_repr())],
    );

    let wanted: Vec<String> = query.ids.iter().map(|id| id.trim().to_uppercase()).collect();
    let mut conn = pool.acquire().await?;
    let rows = load_rows(&mut conn, S::KIND)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.code))
        .collect();
    let types = to_entity_types::<S::Attributes>(&mut conn, S::KIND, rows, &query.fetch_options).await?;
    Ok(types.into_iter().map(|t| (t.perm_id.clone(), t)).collect())
}
