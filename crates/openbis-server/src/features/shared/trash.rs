//! Logical deletion of experiments, samples and data sets
//!
//! Trashing stamps every affected row with the id of a new `deletions` record
//! and snapshots it into `deleted_objects`. Trashed rows are invisible to get
//! and search. A deletion is later either confirmed, which purges the rows,
//! or reverted, which clears the stamp again.
//!
//! Cascade: an experiment takes its samples and data sets along, a sample its
//! component samples and data sets, a data set its component data sets. A
//! data set whose type disallows deletion blocks the whole deletion.

use chrono::Utc;
use openbis_common::types::EntityKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    auth::Session,
    db::push_in,
    error::{ApiError, ApiResult},
    features::{
        entity_types::DataSetTypeAttributes,
        shared::{
            identifiers::{experiment_identifier, sample_identifier},
            properties,
        },
    },
    index::{outbox, IndexAction},
};

/// Entities affected by a deletion, per kind
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrashSet {
    pub experiments: Vec<i64>,
    pub samples: Vec<i64>,
    pub data_sets: Vec<i64>,
}

impl TrashSet {
    fn push(&mut self, kind: EntityKind, id: i64) -> bool {
        let list = match kind {
            EntityKind::Experiment => &mut self.experiments,
            EntityKind::Sample => &mut self.samples,
            EntityKind::DataSet => &mut self.data_sets,
            EntityKind::Material => return false,
        };
        if list.contains(&id) {
            false
        } else {
            list.push(id);
            true
        }
    }

    fn entries(&self) -> impl Iterator<Item = (EntityKind, i64)> + '_ {
        self.experiments
            .iter()
            .map(|id| (EntityKind::Experiment, *id))
            .chain(self.samples.iter().map(|id| (EntityKind::Sample, *id)))
            .chain(self.data_sets.iter().map(|id| (EntityKind::DataSet, *id)))
    }

    pub fn len(&self) -> usize {
        self.experiments.len() + self.samples.len() + self.data_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn live_ids(conn: &mut SqliteConnection, sql: &str, id: i64) -> ApiResult<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(sql).bind(id).fetch_all(&mut *conn).await?;
    Ok(ids)
}

/// Collect the roots and everything they drag along
pub async fn collect_cascade(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    roots: &[i64],
) -> ApiResult<TrashSet> {
    let mut set = TrashSet::default();
    let mut pending: Vec<(EntityKind, i64)> = roots.iter().map(|id| (kind, *id)).collect();

    while let Some((kind, id)) = pending.pop() {
        if !set.push(kind, id) {
            continue;
        }
        match kind {
            EntityKind::Experiment => {
                for sample in live_ids(
                    conn,
                    "SELECT id FROM samples WHERE experiment_id = ? AND deletion_id IS NULL",
                    id,
                )
                .await?
                {
                    pending.push((EntityKind::Sample, sample));
                }
                for data_set in live_ids(
                    conn,
                    "SELECT id FROM data_sets WHERE experiment_id = ? AND deletion_id IS NULL",
                    id,
                )
                .await?
                {
                    pending.push((EntityKind::DataSet, data_set));
                }
            },
            EntityKind::Sample => {
                for component in live_ids(
                    conn,
                    "SELECT id FROM samples WHERE container_id = ? AND deletion_id IS NULL",
                    id,
                )
                .await?
                {
                    pending.push((EntityKind::Sample, component));
                }
                for data_set in live_ids(
                    conn,
                    "SELECT id FROM data_sets WHERE sample_id = ? AND deletion_id IS NULL",
                    id,
                )
                .await?
                {
                    pending.push((EntityKind::DataSet, data_set));
                }
            },
            EntityKind::DataSet => {
                for component in live_ids(
                    conn,
                    r#"SELECT c.component_id FROM data_set_components c
                       JOIN data_sets d ON d.id = c.component_id
                       WHERE c.container_id = ? AND d.deletion_id IS NULL"#,
                    id,
                )
                .await?
                {
                    pending.push((EntityKind::DataSet, component));
                }
            },
            EntityKind::Material => {},
        }
    }

    Ok(set)
}

#[derive(FromRow)]
struct Snapshot {
    perm_id: String,
    code: String,
    type_code: String,
    space_code: Option<String>,
    project_code: Option<String>,
    container_code: Option<String>,
}

async fn snapshot(conn: &mut SqliteConnection, kind: EntityKind, id: i64) -> ApiResult<Snapshot> {
    let sql = match kind {
        EntityKind::Experiment => {
            r#"SELECT e.perm_id, e.code, t.code AS type_code, s.code AS space_code,
                      p.code AS project_code, NULL AS container_code
               FROM experiments e
               JOIN entity_types t ON t.id = e.type_id
               JOIN projects p ON p.id = e.project_id
               JOIN spaces s ON s.id = p.space_id
               WHERE e.id = ?"#
        },
        EntityKind::Sample => {
            r#"SELECT sa.perm_id, sa.code, t.code AS type_code, s.code AS space_code,
                      p.code AS project_code, c.code AS container_code
               FROM samples sa
               JOIN entity_types t ON t.id = sa.type_id
               LEFT JOIN spaces s ON s.id = sa.space_id
               LEFT JOIN projects p ON p.id = sa.project_id
               LEFT JOIN samples c ON c.id = sa.container_id
               WHERE sa.id = ?"#
        },
        EntityKind::DataSet | EntityKind::Material => {
            r#"SELECT d.code AS perm_id, d.code, t.code AS type_code, NULL AS space_code,
                      NULL AS project_code, NULL AS container_code
               FROM data_sets d
               JOIN entity_types t ON t.id = d.type_id
               WHERE d.id = ?"#
        },
    };
    let row: Snapshot = sqlx::query_as(sql).bind(id).fetch_one(&mut *conn).await?;
    Ok(row)
}

/// Fail when any of the data sets has a type that disallows deletion
async fn ensure_deletable(conn: &mut SqliteConnection, data_set_ids: &[i64]) -> ApiResult<()> {
    if data_set_ids.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT d.code, t.code, t.attributes FROM data_sets d JOIN entity_types t ON t.id = d.type_id WHERE ",
    );
    push_in(&mut builder, "d.id", data_set_ids);
    builder.push(" ORDER BY d.code");
    let rows: Vec<(String, String, String)> = builder.build_query_as().fetch_all(&mut *conn).await?;

    let mut blocked = Vec::new();
    for (code, type_code, attributes) in rows {
        let attributes: DataSetTypeAttributes = if attributes.trim().is_empty() {
            DataSetTypeAttributes::default()
        } else {
            serde_json::from_str(&attributes)?
        };
        if attributes.disallow_deletion {
            blocked.push(format!("{} ({})", code, type_code));
        }
    }
    if blocked.is_empty() {
        Ok(())
    } else {
        Err(ApiError::user(format!(
            "Deletion failed because the following data sets have 'Disallow deletion' flag set to true in their type: [{}]",
            blocked.join(", ")
        )))
    }
}

/// Move entities of one kind, with their cascade, into a new deletion.
///
/// Returns the deletion id, or `None` when there was nothing to delete.
pub async fn move_to_trash(
    conn: &mut SqliteConnection,
    session: &Session,
    reason: &str,
    kind: EntityKind,
    roots: &[i64],
) -> ApiResult<Option<i64>> {
    if roots.is_empty() {
        return Ok(None);
    }

    let set = collect_cascade(conn, kind, roots).await?;
    ensure_deletable(conn, &set.data_sets).await?;
    let deletion_id = sqlx::query(
        "INSERT INTO deletions (reason, registrator_id, registration_date) VALUES (?, ?, ?)",
    )
    .bind(reason)
    .bind(session.person_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    for (kind, id) in set.entries() {
        let snap = snapshot(conn, kind, id).await?;
        let identifier = match kind {
            EntityKind::Experiment => experiment_identifier(
                snap.space_code.as_deref().unwrap_or_default(),
                snap.project_code.as_deref().unwrap_or_default(),
                &snap.code,
            ),
            EntityKind::Sample => sample_identifier(
                snap.space_code.as_deref(),
                snap.project_code.as_deref(),
                snap.container_code.as_deref(),
                &snap.code,
            ),
            EntityKind::DataSet | EntityKind::Material => snap.code.clone(),
        };

        sqlx::query(
            r#"INSERT INTO deleted_objects
               (deletion_id, entity_kind, entity_id, perm_id, identifier, entity_type_code)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(deletion_id)
        .bind(kind.as_str())
        .bind(id)
        .bind(&snap.perm_id)
        .bind(&identifier)
        .bind(&snap.type_code)
        .execute(&mut *conn)
        .await?;

        let update = format!("UPDATE {} SET deletion_id = ? WHERE id = ?", kind.table());
        sqlx::query(&update)
            .bind(deletion_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        outbox::record(conn, kind, &snap.perm_id, IndexAction::Remove).await?;
    }

    tracing::info!(
        deletion_id,
        experiments = set.experiments.len(),
        samples = set.samples.len(),
        data_sets = set.data_sets.len(),
        "Moved entities to trash"
    );
    Ok(Some(deletion_id))
}

#[derive(FromRow)]
struct DeletedRow {
    entity_kind: String,
    entity_id: i64,
    perm_id: String,
}

async fn deleted_objects(conn: &mut SqliteConnection, deletion_id: i64) -> ApiResult<Vec<DeletedRow>> {
    let rows = sqlx::query_as::<_, DeletedRow>(
        "SELECT entity_kind, entity_id, perm_id FROM deleted_objects WHERE deletion_id = ?",
    )
    .bind(deletion_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Bring the entities of a deletion back and drop the deletion record
pub async fn revert(conn: &mut SqliteConnection, deletion_id: i64) -> ApiResult<usize> {
    let rows = deleted_objects(conn, deletion_id).await?;
    for row in &rows {
        let kind: EntityKind = row.entity_kind.parse()?;
        let update = format!(
            "UPDATE {} SET deletion_id = NULL WHERE id = ? AND deletion_id = ?",
            kind.table()
        );
        sqlx::query(&update)
            .bind(row.entity_id)
            .bind(deletion_id)
            .execute(&mut *conn)
            .await?;
        outbox::record(conn, kind, &row.perm_id, IndexAction::Upsert).await?;
    }

    sqlx::query("DELETE FROM deletions WHERE id = ?")
        .bind(deletion_id)
        .execute(&mut *conn)
        .await?;
    Ok(rows.len())
}

async fn execute_with_ids(
    conn: &mut SqliteConnection,
    prefix: &str,
    column: &str,
    ids: &[i64],
) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(prefix);
    push_in(&mut builder, column, ids);
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Permanently remove the entities of a deletion and the deletion itself
pub async fn purge(conn: &mut SqliteConnection, deletion_id: i64) -> ApiResult<usize> {
    let rows = deleted_objects(conn, deletion_id).await?;
    let mut set = TrashSet::default();
    for row in &rows {
        set.push(row.entity_kind.parse()?, row.entity_id);
    }

    for (kind, ids) in [
        (EntityKind::DataSet, &set.data_sets),
        (EntityKind::Sample, &set.samples),
        (EntityKind::Experiment, &set.experiments),
    ] {
        properties::delete_all(conn, kind, ids).await?;
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM entity_tags WHERE entity_kind = ");
        builder.push_bind(kind.as_str());
        if !ids.is_empty() {
            builder.push(" AND ");
            push_in(&mut builder, "entity_id", ids);
            builder.build().execute(&mut *conn).await?;
        }
    }

    // Rows parked in other deletions may still point at what is purged here
    execute_with_ids(conn, "UPDATE data_sets SET sample_id = NULL WHERE ", "sample_id", &set.samples).await?;
    execute_with_ids(conn, "UPDATE data_sets SET experiment_id = NULL WHERE ", "experiment_id", &set.experiments).await?;
    execute_with_ids(conn, "UPDATE samples SET experiment_id = NULL WHERE ", "experiment_id", &set.experiments).await?;
    execute_with_ids(conn, "UPDATE samples SET container_id = NULL WHERE ", "container_id", &set.samples).await?;

    execute_with_ids(conn, "DELETE FROM data_sets WHERE ", "id", &set.data_sets).await?;
    execute_with_ids(conn, "DELETE FROM samples WHERE ", "id", &set.samples).await?;
    execute_with_ids(conn, "DELETE FROM experiments WHERE ", "id", &set.experiments).await?;

    for row in &rows {
        outbox::record(conn, row.entity_kind.parse()?, &row.perm_id, IndexAction::Remove).await?;
    }

    sqlx::query("DELETE FROM deletions WHERE id = ?")
        .bind(deletion_id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(deletion_id, objects = rows.len(), "Deletion confirmed");
    Ok(rows.len())
}
