//! Parent-child and container-component links between data sets
//!
//! Both relations are directed acyclic graphs over data sets and share one
//! implementation, parameterized by [`Link`].

use openbis_common::types::DataSetKind;
use sqlx::SqliteConnection;
use std::collections::HashMap;

use super::DataSetRecord;
use crate::{
    error::{ApiError, ApiResult},
    features::{
        data_sets,
        shared::{updates::plan_links, ListUpdate},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `upper` is the parent, `lower` the child
    Lineage,
    /// `upper` is the container, `lower` the component
    Containment,
}

impl Link {
    fn table(self) -> &'static str {
        match self {
            Link::Lineage => "data_set_relationships",
            Link::Containment => "data_set_components",
        }
    }

    fn upper(self) -> &'static str {
        match self {
            Link::Lineage => "parent_id",
            Link::Containment => "container_id",
        }
    }

    fn lower(self) -> &'static str {
        match self {
            Link::Lineage => "child_id",
            Link::Containment => "component_id",
        }
    }
}

async fn ids(conn: &mut SqliteConnection, sql: &str, id: i64) -> ApiResult<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(sql).bind(id).fetch_all(&mut *conn).await?;
    Ok(ids)
}

/// Parents or containers of `id`
pub(crate) async fn uppers_of(conn: &mut SqliteConnection, link: Link, id: i64) -> ApiResult<Vec<i64>> {
    let sql = format!("SELECT {} FROM {} WHERE {} = ?", link.upper(), link.table(), link.lower());
    ids(conn, &sql, id).await
}

/// Children or components of `id`
pub(crate) async fn lowers_of(conn: &mut SqliteConnection, link: Link, id: i64) -> ApiResult<Vec<i64>> {
    let sql = format!("SELECT {} FROM {} WHERE {} = ?", link.lower(), link.table(), link.upper());
    ids(conn, &sql, id).await
}

/// Whether `candidate` is `id` itself or above it in the graph
async fn is_above_or_self(conn: &mut SqliteConnection, link: Link, id: i64, candidate: i64) -> ApiResult<bool> {
    if id == candidate {
        return Ok(true);
    }
    let sql = format!(
        r#"
        WITH RECURSIVE above(id) AS (
            SELECT {upper} FROM {table} WHERE {lower} = ?1
            UNION
            SELECT r.{upper} FROM {table} r JOIN above a ON r.{lower} = a.id
        )
        SELECT COUNT(*) FROM above WHERE id = ?2
        "#,
        upper = link.upper(),
        lower = link.lower(),
        table = link.table(),
    );
    let found: i64 = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(candidate)
        .fetch_one(&mut *conn)
        .await?;
    Ok(found > 0)
}

/// Connect `upper` above `lower`; connecting twice is a no-op
pub(crate) async fn connect(
    conn: &mut SqliteConnection,
    link: Link,
    upper: &DataSetRecord,
    lower: &DataSetRecord,
) -> ApiResult<()> {
    if link == Link::Containment && upper.kind()? != DataSetKind::Container {
        return Err(ApiError::user(format!(
            "Data set '{}' is not a container data set",
            upper.code
        )));
    }
    if is_above_or_self(conn, link, upper.id, lower.id).await? {
        let relation = match link {
            Link::Lineage => "be a parent of",
            Link::Containment => "contain",
        };
        return Err(ApiError::user(format!(
            "Data set '{}' cannot {} '{}' as this would create a cycle",
            upper.code, relation, lower.code
        )));
    }
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        link.table(),
        link.upper(),
        link.lower()
    );
    sqlx::query(&sql)
        .bind(upper.id)
        .bind(lower.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn disconnect(conn: &mut SqliteConnection, link: Link, upper: i64, lower: i64) -> ApiResult<()> {
    let sql = format!("DELETE FROM {} WHERE {} = ? AND {} = ?", link.table(), link.upper(), link.lower());
    sqlx::query(&sql).bind(upper).bind(lower).execute(&mut *conn).await?;
    Ok(())
}

/// Which end of the link the updated data set sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Upper,
    Lower,
}

/// Apply a list update of the data sets on the other end of `link`
pub(crate) async fn relink(
    conn: &mut SqliteConnection,
    link: Link,
    data_set: &DataSetRecord,
    side: Side,
    update: &ListUpdate<String>,
) -> ApiResult<()> {
    if update.is_empty() {
        return Ok(());
    }
    let mut records: HashMap<i64, DataSetRecord> = HashMap::new();
    let set = match &update.set {
        Some(codes) => Some(data_sets::require_all(conn, codes).await?),
        None => None,
    };
    let add = data_sets::require_all(conn, &update.add).await?;
    let mut remove = Vec::new();
    for code in &update.remove {
        if let Some(record) = data_sets::resolve(conn, code).await? {
            remove.push(record.id);
        }
    }
    let mut keep = |list: Vec<DataSetRecord>| -> Vec<i64> {
        list.into_iter()
            .map(|record| {
                let id = record.id;
                records.insert(id, record);
                id
            })
            .collect()
    };
    let set = set.map(&mut keep);
    let add = keep(add);

    let current = match side {
        Side::Upper => lowers_of(conn, link, data_set.id).await?,
        Side::Lower => uppers_of(conn, link, data_set.id).await?,
    };
    let plan = plan_links(&current, set.as_deref(), &add, &remove);
    for other in &plan.remove {
        match side {
            Side::Upper => disconnect(conn, link, data_set.id, *other).await?,
            Side::Lower => disconnect(conn, link, *other, data_set.id).await?,
        }
    }
    for other in &plan.add {
        let Some(other) = records.get(other) else {
            continue;
        };
        match side {
            Side::Upper => connect(conn, link, data_set, other).await?,
            Side::Lower => connect(conn, link, other, data_set).await?,
        }
    }
    Ok(())
}

/// Every link between live data sets as `(upper, lower)` row id pairs
pub(crate) async fn load(conn: &mut SqliteConnection, link: Link) -> ApiResult<Vec<(i64, i64)>> {
    let sql = format!(
        r#"
        SELECT r.{upper}, r.{lower} FROM {table} r
        JOIN data_sets u ON u.id = r.{upper} AND u.deletion_id IS NULL
        JOIN data_sets l ON l.id = r.{lower} AND l.deletion_id IS NULL
        "#,
        upper = link.upper(),
        lower = link.lower(),
        table = link.table(),
    );
    let pairs: Vec<(i64, i64)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
    Ok(pairs)
}
