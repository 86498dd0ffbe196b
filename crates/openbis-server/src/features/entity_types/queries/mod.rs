pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::EntityKind;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{error::ApiResult, features::shared::fetch::Fetched};

pub use get::GetEntityTypesQuery;
pub use search::{EntityTypeSearchCriteria, SearchEntityTypesQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTypeFetchOptions {
    pub property_assignments: bool,
}

/// A property type as assigned to an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PropertyAssignment {
    pub property_type: String,
    pub label: String,
    pub data_type: String,
    pub mandatory: bool,
    pub ordinal: i64,
    pub section: Option<String>,
    pub show_in_edit_views: bool,
    pub plugin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "A: Serialize", deserialize = "A: DeserializeOwned"))]
pub struct EntityType<A> {
    pub perm_id: String,
    pub code: String,
    pub kind: EntityKind,
    pub description: Option<String>,
    pub validation_plugin: Option<String>,
    pub modification_date: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: A,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub property_assignments: Fetched<Vec<PropertyAssignment>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct EntityTypeRow {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub validation_plugin: Option<String>,
    pub attributes: String,
    pub modification_date: DateTime<Utc>,
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection, kind: EntityKind) -> ApiResult<Vec<EntityTypeRow>> {
    let rows = sqlx::query_as::<_, EntityTypeRow>(
        r#"
        SELECT t.id, t.code, t.description, p.name AS validation_plugin, t.attributes, t.modification_date
        FROM entity_types t
        LEFT JOIN plugins p ON p.id = t.validation_plugin_id
        WHERE t.kind = ?
        ORDER BY t.code
        "#,
    )
    .bind(kind.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

#[derive(FromRow)]
struct AssignmentRow {
    entity_type_id: i64,
    #[sqlx(flatten)]
    assignment: PropertyAssignment,
}

pub(crate) async fn to_entity_types<A: DeserializeOwned + Default>(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    rows: Vec<EntityTypeRow>,
    fetch: &EntityTypeFetchOptions,
) -> ApiResult<Vec<EntityType<A>>> {
    let mut assignments: HashMap<i64, Vec<PropertyAssignment>> = HashMap::new();
    if fetch.property_assignments {
        let all = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT pa.entity_type_id, pt.code AS property_type, pt.label, pt.data_type, pa.mandatory,
                   pa.ordinal, pa.section, pa.show_in_edit_views, pl.name AS plugin
            FROM property_assignments pa
            JOIN property_types pt ON pt.id = pa.property_type_id
            JOIN entity_types t ON t.id = pa.entity_type_id
            LEFT JOIN plugins pl ON pl.id = pa.plugin_id
            WHERE t.kind = ?
            ORDER BY pa.ordinal
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&mut *conn)
        .await?;
        for row in all {
            assignments.entry(row.entity_type_id).or_default().push(row.assignment);
        }
    }

    let mut types = Vec::with_capacity(rows.len());
    for row in rows {
        let attributes: A = if row.attributes.trim().is_empty() {
            A::default()
        } else {
            serde_json::from_str(&row.attributes)?
        };
        types.push(EntityType {
            perm_id: row.code.clone(),
            property_assignments: Fetched::when(fetch.property_assignments, || {
                assignments.remove(&row.id).unwrap_or_default()
            }),
            code: row.code,
            kind,
            description: row.description,
            validation_plugin: row.validation_plugin,
            modification_date: row.modification_date,
            attributes,
        });
    }
    Ok(types)
}
