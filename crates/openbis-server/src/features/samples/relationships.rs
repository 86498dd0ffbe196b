//! Parent-child links between samples
//!
//! Each link is one `sample_relationships` row. The annotations of both
//! sides live on that row, so the parent and the child always read the same
//! values.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeMap, HashMap};

use super::SampleRecord;
use crate::{
    db::push_in,
    error::{ApiError, ApiResult},
    features::shared::EntityRef,
};

/// Free-form key/value annotations on one side of a link
pub type Annotations = BTreeMap<String, String>;

/// Annotations of the link between the sample at hand and `sample_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub sample_id: EntityRef,
    #[serde(default)]
    pub parent_annotations: Annotations,
    #[serde(default)]
    pub child_annotations: Annotations,
}

impl Relationship {
    pub fn new(sample_id: EntityRef) -> Self {
        Self {
            sample_id,
            parent_annotations: Annotations::new(),
            child_annotations: Annotations::new(),
        }
    }
}

pub(crate) async fn parents_of(conn: &mut SqliteConnection, child_id: i64) -> ApiResult<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT parent_id FROM sample_relationships WHERE child_id = ?")
        .bind(child_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

pub(crate) async fn children_of(conn: &mut SqliteConnection, parent_id: i64) -> ApiResult<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT child_id FROM sample_relationships WHERE parent_id = ?")
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

/// Whether `candidate` is `sample` itself or one of its ancestors
async fn is_ancestor_or_self(conn: &mut SqliteConnection, sample: i64, candidate: i64) -> ApiResult<bool> {
    if sample == candidate {
        return Ok(true);
    }
    let found: i64 = sqlx::query_scalar(
        r#"
        WITH RECURSIVE ancestors(id) AS (
            SELECT parent_id FROM sample_relationships WHERE child_id = ?1
            UNION
            SELECT r.parent_id FROM sample_relationships r JOIN ancestors a ON r.child_id = a.id
        )
        SELECT COUNT(*) FROM ancestors WHERE id = ?2
        "#,
    )
    .bind(sample)
    .bind(candidate)
    .fetch_one(&mut *conn)
    .await?;
    Ok(found > 0)
}

/// Link `parent` to `child`; linking twice is a no-op
pub(crate) async fn link(conn: &mut SqliteConnection, parent: &SampleRecord, child: &SampleRecord) -> ApiResult<()> {
    if is_ancestor_or_self(conn, parent.id, child.id).await? {
        return Err(ApiError::user(format!(
            "Sample '{}' cannot be a parent of '{}' as this would create a cycle",
            parent.identifier(),
            child.identifier()
        )));
    }
    sqlx::query("INSERT OR IGNORE INTO sample_relationships (parent_id, child_id) VALUES (?, ?)")
        .bind(parent.id)
        .bind(child.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn unlink(conn: &mut SqliteConnection, parent_id: i64, child_id: i64) -> ApiResult<()> {
    sqlx::query("DELETE FROM sample_relationships WHERE parent_id = ? AND child_id = ?")
        .bind(parent_id)
        .bind(child_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Store the annotations of the existing link between `sample` and `other`
pub(crate) async fn annotate(
    conn: &mut SqliteConnection,
    sample: &SampleRecord,
    other: &SampleRecord,
    relationship: &Relationship,
) -> ApiResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE sample_relationships SET parent_annotations = ?, child_annotations = ?
        WHERE (parent_id = ?3 AND child_id = ?4) OR (parent_id = ?4 AND child_id = ?3)
        "#,
    )
    .bind(serde_json::to_string(&relationship.parent_annotations)?)
    .bind(serde_json::to_string(&relationship.child_annotations)?)
    .bind(sample.id)
    .bind(other.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(ApiError::user(format!(
            "Sample '{}' is neither a parent nor a child of '{}'",
            other.identifier(),
            sample.identifier()
        )));
    }
    Ok(())
}

/// One stored link with its annotations
#[derive(Debug, Clone, FromRow)]
pub(crate) struct LinkRow {
    pub parent_id: i64,
    pub child_id: i64,
    pub parent_annotations: String,
    pub child_annotations: String,
}

impl LinkRow {
    pub fn annotations(&self) -> ApiResult<(Annotations, Annotations)> {
        Ok((
            serde_json::from_str(&self.parent_annotations)?,
            serde_json::from_str(&self.child_annotations)?,
        ))
    }
}

/// Links touching any of `sample_ids`, keyed by parent and by child
pub(crate) async fn load(
    conn: &mut SqliteConnection,
    sample_ids: &[i64],
) -> ApiResult<(HashMap<i64, Vec<LinkRow>>, HashMap<i64, Vec<LinkRow>>)> {
    let mut by_child: HashMap<i64, Vec<LinkRow>> = HashMap::new();
    let mut by_parent: HashMap<i64, Vec<LinkRow>> = HashMap::new();
    if sample_ids.is_empty() {
        return Ok((by_child, by_parent));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT r.parent_id, r.child_id, r.parent_annotations, r.child_annotations \
         FROM sample_relationships r \
         JOIN samples p ON p.id = r.parent_id AND p.deletion_id IS NULL \
         JOIN samples c ON c.id = r.child_id AND c.deletion_id IS NULL WHERE (",
    );
    push_in(&mut builder, "r.parent_id", sample_ids);
    builder.push(" OR ");
    push_in(&mut builder, "r.child_id", sample_ids);
    builder.push(")");

    for row in builder.build_query_as::<LinkRow>().fetch_all(&mut *conn).await? {
        if sample_ids.contains(&row.child_id) {
            by_child.entry(row.child_id).or_default().push(row.clone());
        }
        if sample_ids.contains(&row.parent_id) {
            by_parent.entry(row.parent_id).or_default().push(row);
        }
    }
    Ok((by_child, by_parent))
}
