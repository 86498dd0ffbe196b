pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::{
    auth::Session,
    db::push_in,
    error::ApiResult,
    features::shared::{fetch::Fetched, ids::tag_perm_id, MaterialPermId},
};

pub use get::GetTagsQuery;
pub use search::{SearchTagsQuery, TagSearchCriteria};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagFetchOptions {
    pub experiments: bool,
    pub samples: bool,
    pub data_sets: bool,
    pub materials: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub perm_id: String,
    pub code: String,
    pub description: Option<String>,
    pub owner: String,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    /// Experiment perm ids
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub experiments: Fetched<Vec<String>>,
    /// Sample perm ids
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub samples: Fetched<Vec<String>>,
    /// Data set codes
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub data_sets: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub materials: Fetched<Vec<MaterialPermId>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TagRow {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub owner: String,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl TagRow {
    pub fn perm_id(&self) -> String {
        tag_perm_id(&self.owner, &self.code)
    }
}

/// Tags the caller may see: their own, or every tag for instance admins
pub(crate) async fn load_rows(conn: &mut SqliteConnection, session: &Session) -> ApiResult<Vec<TagRow>> {
    let rows = sqlx::query_as::<_, TagRow>(
        r#"
        SELECT t.id, t.code, t.description, p.user_id AS owner, t.registration_date, t.modification_date
        FROM tags t
        JOIN persons p ON p.id = t.owner_id
        WHERE t.owner_id = ? OR ?
        ORDER BY p.user_id, t.code
        "#,
    )
    .bind(session.person_id)
    .bind(session.is_instance_admin())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

#[derive(FromRow)]
struct LinkRow {
    tag_id: i64,
    perm_id: String,
    type_code: Option<String>,
}

/// Perm ids of the live entities linked to each tag
async fn load_links(
    conn: &mut SqliteConnection,
    select: &str,
    tag_ids: &[i64],
) -> ApiResult<HashMap<i64, Vec<LinkRow>>> {
    let mut links: HashMap<i64, Vec<LinkRow>> = HashMap::new();
    if tag_ids.is_empty() {
        return Ok(links);
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(select);
    builder.push(" AND ");
    push_in(&mut builder, "et.tag_id", tag_ids);
    builder.push(" ORDER BY 2");
    for row in builder.build_query_as::<LinkRow>().fetch_all(&mut *conn).await? {
        links.entry(row.tag_id).or_default().push(row);
    }
    Ok(links)
}

const EXPERIMENT_LINKS: &str = "SELECT et.tag_id, e.perm_id, NULL AS type_code FROM entity_tags et \
    JOIN experiments e ON e.id = et.entity_id WHERE et.entity_kind = 'EXPERIMENT' AND e.deletion_id IS NULL";
const SAMPLE_LINKS: &str = "SELECT et.tag_id, e.perm_id, NULL AS type_code FROM entity_tags et \
    JOIN samples e ON e.id = et.entity_id WHERE et.entity_kind = 'SAMPLE' AND e.deletion_id IS NULL";
const DATA_SET_LINKS: &str = "SELECT et.tag_id, e.code AS perm_id, NULL AS type_code FROM entity_tags et \
    JOIN data_sets e ON e.id = et.entity_id WHERE et.entity_kind = 'DATA_SET' AND e.deletion_id IS NULL";
const MATERIAL_LINKS: &str = "SELECT et.tag_id, e.code AS perm_id, t.code AS type_code FROM entity_tags et \
    JOIN materials e ON e.id = et.entity_id JOIN entity_types t ON t.id = e.type_id \
    WHERE et.entity_kind = 'MATERIAL'";

fn perm_ids(links: &mut HashMap<i64, Vec<LinkRow>>, tag_id: i64) -> Vec<String> {
    links
        .remove(&tag_id)
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.perm_id)
        .collect()
}

pub(crate) async fn to_tags(
    conn: &mut SqliteConnection,
    rows: Vec<TagRow>,
    fetch: &TagFetchOptions,
) -> ApiResult<Vec<Tag>> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let none = Vec::new();
    let wanted = |flag: bool| if flag { ids.as_slice() } else { none.as_slice() };

    let mut experiments = load_links(conn, EXPERIMENT_LINKS, wanted(fetch.experiments)).await?;
    let mut samples = load_links(conn, SAMPLE_LINKS, wanted(fetch.samples)).await?;
    let mut data_sets = load_links(conn, DATA_SET_LINKS, wanted(fetch.data_sets)).await?;
    let mut materials = load_links(conn, MATERIAL_LINKS, wanted(fetch.materials)).await?;

    Ok(rows
        .into_iter()
        .map(|row| Tag {
            perm_id: row.perm_id(),
            experiments: Fetched::when(fetch.experiments, || perm_ids(&mut experiments, row.id)),
            samples: Fetched::when(fetch.samples, || perm_ids(&mut samples, row.id)),
            data_sets: Fetched::when(fetch.data_sets, || perm_ids(&mut data_sets, row.id)),
            materials: Fetched::when(fetch.materials, || {
                materials
                    .remove(&row.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|link| MaterialPermId::new(link.perm_id, link.type_code.unwrap_or_default()))
                    .collect()
            }),
            code: row.code,
            description: row.description,
            owner: row.owner,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
