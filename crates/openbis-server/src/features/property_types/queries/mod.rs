pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::code::is_internal_code;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{error::ApiResult, features::shared::fetch::Fetched};

pub use get::GetPropertyTypesQuery;
pub use search::{PropertyTypeSearchCriteria, SearchPropertyTypesQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyTypeFetchOptions {
    pub registrator: bool,
    /// Entity types the property type is assigned to, as `CODE (KIND)`
    pub assigned_to: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyType {
    pub perm_id: String,
    pub code: String,
    pub label: String,
    pub description: String,
    pub data_type: String,
    pub vocabulary: Option<String>,
    pub material_type: Option<String>,
    pub managed_internally: bool,
    pub internal_name_space: bool,
    pub registration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub assigned_to: Fetched<Vec<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PropertyTypeRow {
    pub id: i64,
    pub code: String,
    pub label: String,
    pub description: String,
    pub data_type: String,
    pub vocabulary: Option<String>,
    pub material_type: Option<String>,
    pub managed_internally: bool,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<PropertyTypeRow>> {
    let rows = sqlx::query_as::<_, PropertyTypeRow>(
        r#"
        SELECT pt.id, pt.code, pt.label, pt.description, pt.data_type, v.code AS vocabulary,
               mt.code AS material_type, pt.managed_internally, p.user_id AS registrator,
               pt.registration_date
        FROM property_types pt
        LEFT JOIN vocabularies v ON v.id = pt.vocabulary_id
        LEFT JOIN entity_types mt ON mt.id = pt.material_type_id
        LEFT JOIN persons p ON p.id = pt.registrator_id
        ORDER BY pt.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn to_property_types(
    conn: &mut SqliteConnection,
    rows: Vec<PropertyTypeRow>,
    fetch: &PropertyTypeFetchOptions,
) -> ApiResult<Vec<PropertyType>> {
    let mut assigned: HashMap<i64, Vec<String>> = HashMap::new();
    if fetch.assigned_to {
        let all: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT pa.property_type_id, t.code, t.kind FROM property_assignments pa
            JOIN entity_types t ON t.id = pa.entity_type_id
            ORDER BY t.kind, t.code
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;
        for (property_type_id, code, kind) in all {
            assigned
                .entry(property_type_id)
                .or_default()
                .push(format!("{} ({})", code, kind));
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| PropertyType {
            perm_id: row.code.clone(),
            internal_name_space: is_internal_code(&row.code),
            assigned_to: Fetched::when(fetch.assigned_to, || assigned.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            code: row.code,
            label: row.label,
            description: row.description,
            data_type: row.data_type,
            vocabulary: row.vocabulary,
            material_type: row.material_type,
            managed_internally: row.managed_internally,
            registration_date: row.registration_date,
        })
        .collect())
}
