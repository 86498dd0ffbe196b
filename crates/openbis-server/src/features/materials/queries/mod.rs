pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{
    error::ApiResult,
    features::shared::{
        fetch::Fetched,
        properties::{self, PropertyMap},
        tags, MaterialPermId,
    },
};

pub use get::GetMaterialsQuery;
pub use search::{MaterialSearchCriteria, SearchMaterialsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialFetchOptions {
    pub properties: bool,
    pub tags: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub perm_id: MaterialPermId,
    pub code: String,
    #[serde(rename = "type")]
    pub type_code: String,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub properties: Fetched<PropertyMap>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub tags: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct MaterialRow {
    pub id: i64,
    pub code: String,
    pub type_code: String,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

/// Every material, ordered by type and code
pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<MaterialRow>> {
    let rows = sqlx::query_as::<_, MaterialRow>(
        r#"
        SELECT m.id, m.code, t.code AS type_code, r.user_id AS registrator,
               m.registration_date, m.modification_date
        FROM materials m
        JOIN entity_types t ON t.id = m.type_id
        LEFT JOIN persons r ON r.id = m.registrator_id
        ORDER BY t.code, m.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn to_materials(
    conn: &mut SqliteConnection,
    rows: Vec<MaterialRow>,
    fetch: &MaterialFetchOptions,
) -> ApiResult<Vec<Material>> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut values = if fetch.properties {
        properties::load(conn, EntityKind::Material, &ids).await?
    } else {
        HashMap::new()
    };
    let mut tag_ids = if fetch.tags {
        tags::load(conn, EntityKind::Material, &ids).await?
    } else {
        HashMap::new()
    };

    Ok(rows
        .into_iter()
        .map(|row| Material {
            perm_id: MaterialPermId::new(&row.code, &row.type_code),
            properties: Fetched::when(fetch.properties, || values.remove(&row.id).unwrap_or_default()),
            tags: Fetched::when(fetch.tags, || tag_ids.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            code: row.code,
            type_code: row.type_code,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
