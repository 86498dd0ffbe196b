//! Tags: personal labels a person attaches to experiments, samples, data sets
//! and materials
//!
//! A tag is owned by the person who created it and addressed as
//! `/owner/CODE`. Only the owner and instance admins see or change it.
//! Entity slices attach tags through [`crate::features::shared::tags`]; this
//! slice manages the tags themselves and their links from the tag side.

pub mod commands;
pub mod queries;
pub mod routes;

use openbis_common::types::EntityKind;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        data_sets, experiments, materials, samples,
        shared::{
            ids::tag_perm_id,
            tags::{link, owner_and_code, unlink},
            updates::plan_links,
            EntityRef, MaterialPermId, TagId,
        },
    },
};

pub use commands::{CreateTagsCommand, DeleteTagsCommand, TagCreation, TagUpdate, UpdateTagsCommand};
pub use queries::{GetTagsQuery, SearchTagsQuery, Tag, TagFetchOptions, TagSearchCriteria};
pub use routes::tags_routes;

#[derive(Debug, Clone, FromRow)]
pub struct TagRecord {
    pub id: i64,
    pub code: String,
    pub owner_id: i64,
    pub owner: String,
}

impl TagRecord {
    pub fn perm_id(&self) -> String {
        tag_perm_id(&self.owner, &self.code)
    }

    /// Only the owner and instance admins may change or delete a tag
    pub fn authorize_change(&self, session: &Session) -> ApiResult<()> {
        if self.owner_id == session.person_id || session.is_instance_admin() {
            Ok(())
        } else {
            Err(ApiError::unauthorized("TagPermId", self.perm_id()))
        }
    }
}

pub async fn resolve(conn: &mut SqliteConnection, session: &Session, id: &TagId) -> ApiResult<Option<TagRecord>> {
    let (owner, code) = owner_and_code(session, id)?;
    let record = sqlx::query_as::<_, TagRecord>(
        r#"
        SELECT t.id, t.code, t.owner_id, p.user_id AS owner
        FROM tags t
        JOIN persons p ON p.id = t.owner_id
        WHERE p.user_id = ? AND t.code = ?
        "#,
    )
    .bind(&owner)
    .bind(&code)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, session: &Session, id: &TagId) -> ApiResult<TagRecord> {
    match resolve(conn, session, id).await? {
        Some(record) => Ok(record),
        None => {
            let (owner, code) = owner_and_code(session, id)?;
            Err(ApiError::not_found("TagPermId", tag_perm_id(&owner, &code)))
        },
    }
}

/// Resolve experiment ids to row ids; every experiment must be readable
pub(crate) async fn experiment_rows(
    conn: &mut SqliteConnection,
    session: &Session,
    ids: &[EntityRef],
) -> ApiResult<Vec<i64>> {
    let scope = session.read_scope();
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let record = experiments::require(conn, id).await?;
        if !scope.allows(Some(record.space_id), Some(record.project_id)) {
            return Err(ApiError::unauthorized("ExperimentIdentifier", record.identifier()));
        }
        rows.push(record.id);
    }
    Ok(rows)
}

pub(crate) async fn sample_rows(
    conn: &mut SqliteConnection,
    session: &Session,
    ids: &[EntityRef],
) -> ApiResult<Vec<i64>> {
    let scope = session.read_scope();
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let record = samples::require(conn, id).await?;
        if !scope.allows(record.space_id, record.project_id) {
            let (kind, name) = record.describe(id);
            return Err(ApiError::unauthorized(kind, name));
        }
        rows.push(record.id);
    }
    Ok(rows)
}

pub(crate) async fn data_set_rows(
    conn: &mut SqliteConnection,
    session: &Session,
    codes: &[String],
) -> ApiResult<Vec<i64>> {
    let scope = session.read_scope();
    let mut rows = Vec::with_capacity(codes.len());
    for code in codes {
        let record = data_sets::require(conn, code).await?;
        if !scope.allows(record.space_id, record.project_id) {
            return Err(ApiError::unauthorized("DataSetPermId", &record.code));
        }
        rows.push(record.id);
    }
    Ok(rows)
}

/// Materials are readable by everybody
pub(crate) async fn material_rows(conn: &mut SqliteConnection, ids: &[MaterialPermId]) -> ApiResult<Vec<i64>> {
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        rows.push(materials::require(conn, id).await?.id);
    }
    Ok(rows)
}

/// Row ids of the live entities of `kind` carrying the tag
pub(crate) async fn linked_rows(conn: &mut SqliteConnection, tag_id: i64, kind: EntityKind) -> ApiResult<Vec<i64>> {
    let sql = match kind {
        EntityKind::Material => {
            "SELECT entity_id FROM entity_tags WHERE tag_id = ? AND entity_kind = ? ORDER BY entity_id".to_string()
        },
        _ => format!(
            "SELECT et.entity_id FROM entity_tags et JOIN {} e ON e.id = et.entity_id \
             WHERE et.tag_id = ? AND et.entity_kind = ? AND e.deletion_id IS NULL ORDER BY et.entity_id",
            kind.table()
        ),
    };
    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(tag_id)
        .bind(kind.as_str())
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

/// Move the tag's links of one kind to the outcome of a list update
pub(crate) async fn apply_links(
    conn: &mut SqliteConnection,
    tag_id: i64,
    kind: EntityKind,
    set: Option<Vec<i64>>,
    add: Vec<i64>,
    remove: Vec<i64>,
) -> ApiResult<()> {
    let current = linked_rows(conn, tag_id, kind).await?;
    let plan = plan_links(&current, set.as_deref(), &add, &remove);
    for entity_id in &plan.add {
        link(conn, kind, *entity_id, &[tag_id]).await?;
    }
    for entity_id in &plan.remove {
        unlink(conn, kind, *entity_id, &[tag_id]).await?;
    }
    Ok(())
}
