//! Tag links of experiments, samples, data sets and materials
//!
//! Tags are owned by a person. Referencing one of the caller's own tags that
//! does not exist yet creates it on the fly; tags of other persons must exist.

use chrono::Utc;
use openbis_common::types::EntityKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::{
    auth::Session,
    db::push_in,
    error::{ApiError, ApiResult},
    features::shared::{
        ids::{tag_perm_id, TagId},
        updates::{plan_links, ListUpdate},
        validation::validate_code,
    },
};

/// Split a tag id into owner user id and code
pub fn owner_and_code(session: &Session, id: &TagId) -> ApiResult<(String, String)> {
    match id {
        TagId::Code(code) => Ok((session.user_id.clone(), validate_code(code, "Tag")?)),
        TagId::PermId(perm_id) => {
            let mut parts = perm_id.trim().trim_start_matches('/').splitn(2, '/');
            match (parts.next(), parts.next()) {
                (Some(owner), Some(code)) if !owner.is_empty() => {
                    Ok((owner.to_string(), validate_code(code, "Tag")?))
                },
                _ => Err(ApiError::user(format!("Invalid tag perm id '{}'", perm_id))),
            }
        },
    }
}

/// Look up a tag, `None` when it does not exist
pub async fn find(conn: &mut SqliteConnection, session: &Session, id: &TagId) -> ApiResult<Option<i64>> {
    let (owner, code) = owner_and_code(session, id)?;
    let tag_id: Option<i64> = sqlx::query_scalar(
        "SELECT t.id FROM tags t JOIN persons p ON p.id = t.owner_id WHERE p.user_id = ? AND t.code = ?",
    )
    .bind(&owner)
    .bind(&code)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(tag_id)
}

/// Resolve tag ids, creating missing tags of the caller
pub async fn resolve_or_create(
    conn: &mut SqliteConnection,
    session: &Session,
    ids: &[TagId],
) -> ApiResult<Vec<i64>> {
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(tag_id) = find(conn, session, id).await? {
            resolved.push(tag_id);
            continue;
        }

        let (owner, code) = owner_and_code(session, id)?;
        if owner != session.user_id {
            return Err(ApiError::not_found("TagPermId", tag_perm_id(&owner, &code)));
        }
        let now = Utc::now();
        let tag_id = sqlx::query(
            "INSERT INTO tags (code, owner_id, registration_date, modification_date) VALUES (?, ?, ?, ?)",
        )
        .bind(&code)
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        tracing::debug!(tag = %code, "Created tag on first use");
        resolved.push(tag_id);
    }
    Ok(resolved)
}

async fn current(conn: &mut SqliteConnection, kind: EntityKind, entity_id: i64) -> ApiResult<Vec<i64>> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT tag_id FROM entity_tags WHERE entity_kind = ? AND entity_id = ?")
            .bind(kind.as_str())
            .bind(entity_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(ids)
}

pub async fn link(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    entity_id: i64,
    tag_ids: &[i64],
) -> ApiResult<()> {
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO entity_tags (tag_id, entity_kind, entity_id) VALUES (?, ?, ?)",
        )
        .bind(tag_id)
        .bind(kind.as_str())
        .bind(entity_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn unlink(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    entity_id: i64,
    tag_ids: &[i64],
) -> ApiResult<()> {
    for tag_id in tag_ids {
        sqlx::query("DELETE FROM entity_tags WHERE tag_id = ? AND entity_kind = ? AND entity_id = ?")
            .bind(tag_id)
            .bind(kind.as_str())
            .bind(entity_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Apply a tag list update to one entity
pub async fn apply_update(
    conn: &mut SqliteConnection,
    session: &Session,
    kind: EntityKind,
    entity_id: i64,
    update: &ListUpdate<TagId>,
) -> ApiResult<()> {
    if update.is_empty() {
        return Ok(());
    }

    let existing = current(conn, kind, entity_id).await?;
    let set = match &update.set {
        Some(ids) => Some(resolve_or_create(conn, session, ids).await?),
        None => None,
    };
    let add = resolve_or_create(conn, session, &update.add).await?;
    let mut remove = Vec::new();
    for id in &update.remove {
        if let Some(tag_id) = find(conn, session, id).await? {
            remove.push(tag_id);
        }
    }

    let plan = plan_links(&existing, set.as_deref(), &add, &remove);
    link(conn, kind, entity_id, &plan.add).await?;
    unlink(conn, kind, entity_id, &plan.remove).await?;
    Ok(())
}

#[derive(FromRow)]
struct TagRow {
    entity_id: i64,
    owner: String,
    code: String,
}

/// Tag perm ids per entity
pub async fn load(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    entity_ids: &[i64],
) -> ApiResult<HashMap<i64, Vec<String>>> {
    let mut result: HashMap<i64, Vec<String>> = HashMap::new();
    if entity_ids.is_empty() {
        return Ok(result);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT et.entity_id, p.user_id AS owner, t.code FROM entity_tags et \
         JOIN tags t ON t.id = et.tag_id JOIN persons p ON p.id = t.owner_id \
         WHERE et.entity_kind = ",
    );
    builder.push_bind(kind.as_str());
    builder.push(" AND ");
    push_in(&mut builder, "et.entity_id", entity_ids);
    builder.push(" ORDER BY t.code");

    for row in builder.build_query_as::<TagRow>().fetch_all(&mut *conn).await? {
        result
            .entry(row.entity_id)
            .or_default()
            .push(tag_perm_id(&row.owner, &row.code));
    }
    Ok(result)
}
