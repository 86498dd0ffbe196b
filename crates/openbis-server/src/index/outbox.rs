//! Index events written alongside entity changes
//!
//! Rows are inserted in the same transaction as the change they describe, so
//! a rolled back batch never reaches the index.

use openbis_common::types::EntityKind;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{db::push_in, error::ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    /// (Re)build the document from the current row
    Upsert,
    Remove,
}

impl IndexAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexAction::Upsert => "UPSERT",
            IndexAction::Remove => "REMOVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UPSERT" => Some(IndexAction::Upsert),
            "REMOVE" => Some(IndexAction::Remove),
            _ => None,
        }
    }
}

pub async fn record(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    perm_id: &str,
    action: IndexAction,
) -> ApiResult<()> {
    sqlx::query("INSERT INTO index_outbox (entity_kind, perm_id, action) VALUES (?, ?, ?)")
        .bind(kind.as_str())
        .bind(perm_id)
        .bind(action.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Record the same action for several entities of one kind
pub async fn record_all(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    perm_ids: &[String],
    action: IndexAction,
) -> ApiResult<()> {
    for perm_id in perm_ids {
        record(conn, kind, perm_id, action).await?;
    }
    Ok(())
}

/// Record `action` for entities of one kind given by row id
pub async fn record_rows(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    ids: &[i64],
    action: IndexAction,
) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(match kind {
        EntityKind::Experiment => "SELECT perm_id FROM experiments e WHERE ",
        EntityKind::Sample => "SELECT perm_id FROM samples e WHERE ",
        EntityKind::DataSet => "SELECT code FROM data_sets e WHERE ",
        EntityKind::Material => {
            "SELECT e.code || ' (' || t.code || ')' FROM materials e JOIN entity_types t ON t.id = e.type_id WHERE "
        },
    });
    push_in(&mut builder, "e.id", ids);
    let perm_ids: Vec<String> = builder.build_query_scalar().fetch_all(&mut *conn).await?;
    record_all(conn, kind, &perm_ids, action).await
}

/// Highest sequence number written so far, 0 when nothing is pending
pub async fn last_sequence(conn: &mut SqliteConnection) -> ApiResult<i64> {
    let seq: Option<i64> = sqlx::query_scalar("SELECT MAX(seq) FROM index_outbox")
        .fetch_one(&mut *conn)
        .await?;
    Ok(seq.unwrap_or(0))
}
