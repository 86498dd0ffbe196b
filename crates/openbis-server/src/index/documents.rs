//! Building index documents from the current database rows

use openbis_common::types::EntityKind;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::ApiResult,
    features::shared::{
        identifiers::{experiment_identifier, sample_identifier},
        properties,
    },
};

/// Searchable view of one live entity
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub kind: EntityKind,
    pub perm_id: String,
    pub identifier: String,
    pub type_code: String,
    pub space_id: Option<i64>,
    pub project_id: Option<i64>,
    /// Lower cased searchable words
    pub terms: Vec<String>,
}

#[derive(FromRow)]
struct DocumentRow {
    id: i64,
    perm_id: String,
    code: String,
    type_code: String,
    space_id: Option<i64>,
    space_code: Option<String>,
    project_id: Option<i64>,
    project_code: Option<String>,
    container_code: Option<String>,
}

const EXPERIMENT_SQL: &str = r#"
    SELECT e.id, e.perm_id, e.code, t.code AS type_code,
           p.space_id, s.code AS space_code, p.id AS project_id, p.code AS project_code,
           NULL AS container_code
    FROM experiments e
    JOIN entity_types t ON t.id = e.type_id
    JOIN projects p ON p.id = e.project_id
    JOIN spaces s ON s.id = p.space_id
    WHERE e.perm_id = ? AND e.deletion_id IS NULL
"#;

const SAMPLE_SQL: &str = r#"
    SELECT sa.id, sa.perm_id, sa.code, t.code AS type_code,
           sa.space_id, s.code AS space_code, sa.project_id, p.code AS project_code,
           c.code AS container_code
    FROM samples sa
    JOIN entity_types t ON t.id = sa.type_id
    LEFT JOIN spaces s ON s.id = sa.space_id
    LEFT JOIN projects p ON p.id = sa.project_id
    LEFT JOIN samples c ON c.id = sa.container_id
    WHERE sa.perm_id = ? AND sa.deletion_id IS NULL
"#;

const DATA_SET_SQL: &str = r#"
    SELECT d.id, d.code AS perm_id, d.code, t.code AS type_code,
           COALESCE(ep.space_id, sa.space_id) AS space_id, NULL AS space_code,
           COALESCE(ep.id, sa.project_id) AS project_id, NULL AS project_code,
           NULL AS container_code
    FROM data_sets d
    JOIN entity_types t ON t.id = d.type_id
    LEFT JOIN experiments e ON e.id = d.experiment_id
    LEFT JOIN projects ep ON ep.id = e.project_id
    LEFT JOIN samples sa ON sa.id = d.sample_id
    WHERE d.code = ? AND d.deletion_id IS NULL
"#;

const MATERIAL_SQL: &str = r#"
    SELECT m.id, m.code || ' (' || t.code || ')' AS perm_id, m.code, t.code AS type_code,
           NULL AS space_id, NULL AS space_code, NULL AS project_id, NULL AS project_code,
           NULL AS container_code
    FROM materials m
    JOIN entity_types t ON t.id = m.type_id
    WHERE m.code || ' (' || t.code || ')' = ?
"#;

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-' && c != '.')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Build the document of a live entity, `None` when it is gone or trashed
pub async fn build(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    perm_id: &str,
) -> ApiResult<Option<IndexDocument>> {
    let sql = match kind {
        EntityKind::Experiment => EXPERIMENT_SQL,
        EntityKind::Sample => SAMPLE_SQL,
        EntityKind::DataSet => DATA_SET_SQL,
        EntityKind::Material => MATERIAL_SQL,
    };

    let row: Option<DocumentRow> = sqlx::query_as(sql)
        .bind(perm_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let identifier = match kind {
        EntityKind::Experiment => experiment_identifier(
            row.space_code.as_deref().unwrap_or_default(),
            row.project_code.as_deref().unwrap_or_default(),
            &row.code,
        ),
        EntityKind::Sample => sample_identifier(
            row.space_code.as_deref(),
            row.project_code.as_deref(),
            row.container_code.as_deref(),
            &row.code,
        ),
        EntityKind::DataSet | EntityKind::Material => row.perm_id.clone(),
    };

    let values = properties::load(conn, kind, &[row.id]).await?;
    let mut terms: Vec<String> = Vec::new();
    for text in [&row.code, &row.perm_id, &row.type_code, &identifier] {
        terms.extend(tokenize(text));
    }
    if let Some(values) = values.get(&row.id) {
        for value in values.values() {
            terms.extend(tokenize(value));
        }
    }
    terms.sort();
    terms.dedup();

    Ok(Some(IndexDocument {
        kind,
        perm_id: row.perm_id,
        identifier,
        type_code: row.type_code,
        space_id: row.space_id,
        project_id: row.project_id,
        terms,
    }))
}

/// Perm ids of every live entity of a kind
pub async fn live_perm_ids(conn: &mut SqliteConnection, kind: EntityKind) -> ApiResult<Vec<String>> {
    let sql = match kind {
        EntityKind::Experiment => "SELECT perm_id FROM experiments WHERE deletion_id IS NULL",
        EntityKind::Sample => "SELECT perm_id FROM samples WHERE deletion_id IS NULL",
        EntityKind::DataSet => "SELECT code FROM data_sets WHERE deletion_id IS NULL",
        EntityKind::Material => {
            "SELECT m.code || ' (' || t.code || ')' FROM materials m JOIN entity_types t ON t.id = m.type_id"
        },
    };
    let ids: Vec<String> = sqlx::query_scalar(sql).fetch_all(&mut *conn).await?;
    Ok(ids)
}
