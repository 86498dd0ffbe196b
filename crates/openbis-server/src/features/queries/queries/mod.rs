pub mod execute;
pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::QueryType;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    auth::Session,
    error::ApiResult,
    features::{queries::QueryDatabases, shared::fetch::Fetched},
};

pub use execute::{ExecuteQueryCommand, ExecuteSqlCommand};
pub use get::GetQueriesQuery;
pub use search::{QuerySearchCriteria, SearchQueriesQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFetchOptions {
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub database_id: String,
    /// Label of the query database, absent when it is no longer configured
    pub database_label: Option<String>,
    pub sql: String,
    pub query_type: QueryType,
    pub entity_type_code_pattern: Option<String>,
    pub public: bool,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QueryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub database_key: String,
    pub sql: String,
    pub query_type: String,
    pub entity_type_code_pattern: Option<String>,
    pub is_public: bool,
    pub registrator_id: Option<i64>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

/// Queries the caller may see, ordered by name
pub(crate) async fn load_rows(conn: &mut SqliteConnection, session: &Session) -> ApiResult<Vec<QueryRow>> {
    let rows = sqlx::query_as::<_, QueryRow>(
        r#"
        SELECT q.id, q.name, q.description, q.database_key, q.sql, q.query_type, q.entity_type_code_pattern,
               q.is_public, q.registrator_id, p.user_id AS registrator, q.registration_date, q.modification_date
        FROM queries q
        LEFT JOIN persons p ON p.id = q.registrator_id
        WHERE q.is_public = 1 OR q.registrator_id = ? OR ?
        ORDER BY q.name
        "#,
    )
    .bind(session.person_id)
    .bind(session.is_instance_admin())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) fn to_queries(
    rows: Vec<QueryRow>,
    databases: &QueryDatabases,
    fetch: &QueryFetchOptions,
) -> ApiResult<Vec<Query>> {
    rows.into_iter()
        .map(|row| {
            Ok(Query {
                query_type: row.query_type.parse()?,
                database_label: databases.get(&row.database_key).map(|db| db.label.clone()),
                registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
                id: row.id,
                name: row.name,
                description: row.description,
                database_id: row.database_key,
                sql: row.sql,
                entity_type_code_pattern: row.entity_type_code_pattern,
                public: row.is_public,
                registration_date: row.registration_date,
                modification_date: row.modification_date,
            })
        })
        .collect()
}
