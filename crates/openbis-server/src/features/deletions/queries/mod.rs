pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{auth::Session, error::ApiResult, features::shared::fetch::Fetched};

pub use search::{DeletionSearchCriteria, SearchDeletionsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionFetchOptions {
    pub deleted_objects: bool,
}

/// Snapshot of a trashed object taken when it was deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedObject {
    pub entity_kind: EntityKind,
    pub perm_id: String,
    pub identifier: String,
    pub entity_type_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deletion {
    pub id: i64,
    pub reason: String,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub total_experiments_count: usize,
    pub total_samples_count: usize,
    pub total_data_sets_count: usize,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub deleted_objects: Fetched<Vec<DeletedObject>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct DeletionRow {
    pub id: i64,
    pub reason: String,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
}

/// Deletions of the caller, or every deletion for instance admins, oldest first
pub(crate) async fn load_rows(conn: &mut SqliteConnection, session: &Session) -> ApiResult<Vec<DeletionRow>> {
    let rows = sqlx::query_as::<_, DeletionRow>(
        r#"
        SELECT d.id, d.reason, p.user_id AS registrator, d.registration_date
        FROM deletions d
        LEFT JOIN persons p ON p.id = d.registrator_id
        WHERE d.registrator_id = ? OR ?
        ORDER BY d.id
        "#,
    )
    .bind(session.person_id)
    .bind(session.is_instance_admin())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

#[derive(FromRow)]
struct DeletedObjectRow {
    deletion_id: i64,
    entity_kind: String,
    perm_id: String,
    identifier: String,
    entity_type_code: String,
}

async fn load_deleted_objects(conn: &mut SqliteConnection) -> ApiResult<HashMap<i64, Vec<DeletedObject>>> {
    let rows = sqlx::query_as::<_, DeletedObjectRow>(
        "SELECT deletion_id, entity_kind, perm_id, identifier, entity_type_code FROM deleted_objects ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut objects: HashMap<i64, Vec<DeletedObject>> = HashMap::new();
    for row in rows {
        objects.entry(row.deletion_id).or_default().push(DeletedObject {
            entity_kind: row.entity_kind.parse()?,
            perm_id: row.perm_id,
            identifier: row.identifier,
            entity_type_code: row.entity_type_code,
        });
    }
    Ok(objects)
}

pub(crate) async fn to_deletions(
    conn: &mut SqliteConnection,
    rows: Vec<DeletionRow>,
    fetch: &DeletionFetchOptions,
) -> ApiResult<Vec<Deletion>> {
    let mut objects = load_deleted_objects(conn).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let deleted = objects.remove(&row.id).unwrap_or_default();
            let count = |kind: EntityKind| deleted.iter().filter(|o| o.entity_kind == kind).count();
            Deletion {
                total_experiments_count: count(EntityKind::Experiment),
                total_samples_count: count(EntityKind::Sample),
                total_data_sets_count: count(EntityKind::DataSet),
                deleted_objects: Fetched::when(fetch.deleted_objects, || deleted.clone()),
                id: row.id,
                reason: row.reason,
                registrator: row.registrator,
                registration_date: row.registration_date,
            }
        })
        .collect())
}
