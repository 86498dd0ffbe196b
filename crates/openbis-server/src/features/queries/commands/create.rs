//! Create stored queries command
//!
//! The caller needs the creator minimal role of the target database, and the
//! statement must pass the same checks as an ad hoc execution.

use chrono::Utc;
use openbis_common::types::QueryType;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{
        queries::{sql::check_select, QueryDatabases},
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, require_non_empty},
        },
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCreation {
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub database_id: Option<String>,
    pub sql: Option<String>,
    pub query_type: QueryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type_code_pattern: Option<String>,
    pub public: bool,
}

impl Default for QueryCreation {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            database_id: None,
            sql: None,
            query_type: QueryType::Generic,
            entity_type_code_pattern: None,
            public: false,
        }
    }
}

impl QueryCreation {
    pub fn new(name: &str, database_id: &str, sql: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            database_id: Some(database_id.to_string()),
            sql: Some(sql.to_string()),
            ..Self::default()
        }
    }
}

crate::struct_log_repr!(QueryCreation, "QueryCreation", "databaseId" => database_id, "name" => name);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateQueriesCommand {
    pub creations: Vec<QueryCreation>,
}

/// Insert the queries, returning their technical ids
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    databases: &QueryDatabases,
    command: &CreateQueriesCommand,
) -> ApiResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let name = require_non_empty(creation.name.as_deref(), "Name")?;
        let database = databases.require(require_non_empty(creation.database_id.as_deref(), "Database id")?)?;
        database.authorize(conn, session).await?;
        let sql = require_non_empty(creation.sql.as_deref(), "Sql")?;
        check_select(sql)?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO queries (name, description, database_key, sql, query_type, entity_type_code_pattern, \
             is_public, registrator_id, registration_date, modification_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(blank_to_none(creation.description.clone()))
        .bind(&database.key)
        .bind(sql)
        .bind(creation.query_type.as_str())
        .bind(blank_to_none(creation.entity_type_code_pattern.clone()))
        .bind(creation.public)
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Query '{}' already exists", name)))?
        .last_insert_rowid();

        tracing::info!(query = %name, database = %database.key, "Query created");
        ids.push(id);
    }
    Ok(ids)
}

#[tracing::instrument(skip_all, fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    databases: &QueryDatabases,
    command: CreateQueriesCommand,
) -> ApiResult<Vec<i64>> {
    access_log::record(
        &session.user_id,
        "create-queries",
        &[("NEW_QUERIES", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let ids = execute(&mut tx, session, databases, &command).await?;
    tx.commit().await?;
    Ok(ids)
}
