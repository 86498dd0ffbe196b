//! Update stored queries command

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
        queries::{self, sql::check_select, QueryDatabases},
        shared::{
            error_helpers::map_unique_violation,
            updates::present,
            validation::{blank_to_none, require_non_empty},
        },
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryUpdate {
    pub query_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryType>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub entity_type_code_pattern: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

impl QueryUpdate {
    pub fn new(query_id: i64) -> Self {
        Self {
            query_id,
            ..Self::default()
        }
    }
}

crate::struct_log_repr!(QueryUpdate, "QueryUpdate", "queryId" => query_id);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQueriesCommand {
    pub updates: Vec<QueryUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    databases: &QueryDatabases,
    command: &UpdateQueriesCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let record = queries::require(conn, update.query_id).await?;
        record.authorize_change(session)?;

        let name = match &update.name {
            Some(name) => require_non_empty(Some(name), "Name")?.to_string(),
            None => record.name.clone(),
        };
        let database_key = update.database_id.as_deref().unwrap_or(&record.database_key);
        let database = databases.require(database_key)?;
        if update.database_id.is_some() || update.sql.is_some() {
            database.authorize(conn, session).await?;
        }
        let sql = match &update.sql {
            Some(sql) => {
                let sql = require_non_empty(Some(sql), "Sql")?;
                check_select(sql)?;
                sql.to_string()
            },
            None => record.sql.clone(),
        };
        let query_type = match update.query_type {
            Some(query_type) => query_type,
            None => record.query_type()?,
        };

        sqlx::query(
            "UPDATE queries SET name = ?, database_key = ?, sql = ?, query_type = ?, \
             is_public = COALESCE(?, is_public), modification_date = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&database.key)
        .bind(&sql)
        .bind(query_type.as_str())
        .bind(update.public)
        .bind(Utc::now())
        .bind(record.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Query '{}' already exists", name)))?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE queries SET description = ? WHERE id = ?")
                .bind(blank_to_none(description.clone()))
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(pattern) = &update.entity_type_code_pattern {
            sqlx::query("UPDATE queries SET entity_type_code_pattern = ? WHERE id = ?")
                .bind(blank_to_none(pattern.clone()))
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip_all, fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    databases: &QueryDatabases,
    command: UpdateQueriesCommand,
) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "update-queries",
        &[("QUERY_UPDATES", command.updates.log_repr())],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, databases, &command).await?;
    tx.commit().await?;
    Ok(())
}
