//! Stored queries and the read-only SQL gateway
//!
//! Queries run against registered query databases. The metadata store itself
//! is always registered (key `1` by default); further SQLite databases can be
//! configured with their own URL. Each database is bound to a space, or to
//! the whole instance, and names the minimal role a caller needs there to
//! create or run queries on it. Statements on the metadata store may not
//! read the session and credential tables.

pub mod commands;
pub mod databases;
pub mod queries;
pub mod routes;
pub mod sql;

use openbis_common::types::{QueryType, Role};
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqliteConnection, SqlitePool};
use std::{str::FromStr, sync::Arc};

use crate::{
    auth::Session,
    config::{Config, QueryDatabaseConfig},
    error::{ApiError, ApiResult},
    features::spaces,
};

pub use commands::{CreateQueriesCommand, DeleteQueriesCommand, QueryCreation, QueryUpdate, UpdateQueriesCommand};
pub use queries::{
    ExecuteQueryCommand, ExecuteSqlCommand, GetQueriesQuery, Query, QueryFetchOptions, QuerySearchCriteria,
    SearchQueriesQuery,
};
pub use routes::queries_routes;
pub use sql::{BoundStatement, TableColumn, TableModel};

/// One registered query database
#[derive(Clone)]
pub struct QueryDatabase {
    pub key: String,
    pub label: String,
    pub space_code: Option<String>,
    pub creator_minimal_role: Role,
    /// Backed by the metadata store rather than a database of its own
    pub metadata: bool,
    pub pool: SqlitePool,
}

impl std::fmt::Debug for QueryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDatabase")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("space_code", &self.space_code)
            .finish()
    }
}

impl QueryDatabase {
    fn new(config: &QueryDatabaseConfig, pool: SqlitePool) -> Self {
        Self {
            key: config.key.clone(),
            label: config.label.clone(),
            space_code: config.space_code.clone(),
            creator_minimal_role: config.creator_minimal_role(),
            metadata: config.url.is_none(),
            pool,
        }
    }

    /// Whether the caller holds the creator minimal role on the database's
    /// space, or on the instance for databases without a space
    pub async fn allows(&self, conn: &mut SqliteConnection, session: &Session) -> ApiResult<bool> {
        match &self.space_code {
            Some(code) => {
                let space_id = spaces::require_id(conn, code).await?;
                Ok(session.has_space_role(space_id, self.creator_minimal_role))
            },
            None => Ok(session.has_instance_role(self.creator_minimal_role)),
        }
    }

    pub async fn authorize(&self, conn: &mut SqliteConnection, session: &Session) -> ApiResult<()> {
        if self.allows(conn, session).await? {
            Ok(())
        } else {
            Err(ApiError::AuthorizationFailure(format!(
                "Queries on database '{}' require at least {} rights on {}",
                self.label,
                self.creator_minimal_role,
                self.space_code
                    .as_deref()
                    .map_or_else(|| "the instance".to_string(), |code| format!("space {}", code))
            )))
        }
    }

    /// Run a checked statement, keeping credential tables out of reach on
    /// the metadata store
    pub async fn run(&self, statement: &BoundStatement) -> ApiResult<TableModel> {
        if self.metadata {
            sql::deny_relations(&statement.sql, CREDENTIAL_TABLES)?;
        }
        sql::run(&self.pool, statement).await
    }
}

/// Tables of the metadata store that queries may never read
pub const CREDENTIAL_TABLES: &[&str] = &["sessions", "credentials"];

/// Registry of the configured query databases; cheap to clone
#[derive(Clone, Debug, Default)]
pub struct QueryDatabases {
    databases: Arc<Vec<QueryDatabase>>,
}

impl QueryDatabases {
    /// Register only the databases backed by the metadata store
    pub fn metadata_only(metadata: SqlitePool, config: &Config) -> Self {
        let databases = config
            .query_databases
            .iter()
            .filter(|db| db.url.is_none())
            .map(|db| QueryDatabase::new(db, metadata.clone()))
            .collect();
        Self {
            databases: Arc::new(databases),
        }
    }

    /// Register every configured database, opening read-only pools for the
    /// ones with their own URL
    pub async fn connect(metadata: SqlitePool, config: &Config) -> Result<Self, sqlx::Error> {
        let mut databases = Vec::with_capacity(config.query_databases.len());
        for db in &config.query_databases {
            let pool = match &db.url {
                None => metadata.clone(),
                Some(url) => {
                    let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)?.read_only(true);
                    let pool = SqlitePoolOptions::new()
                        .max_connections(config.database.max_connections)
                        .connect_with(options)
                        .await?;
                    tracing::info!(key = %db.key, label = %db.label, "Connected query database");
                    pool
                },
            };
            databases.push(QueryDatabase::new(db, pool));
        }
        Ok(Self {
            databases: Arc::new(databases),
        })
    }

    pub fn get(&self, key: &str) -> Option<&QueryDatabase> {
        self.databases.iter().find(|db| db.key == key.trim())
    }

    pub fn require(&self, key: &str) -> ApiResult<&QueryDatabase> {
        self.get(key)
            .ok_or_else(|| ApiError::not_found("QueryDatabaseId", key.trim()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryDatabase> {
        self.databases.iter()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct QueryRecord {
    pub id: i64,
    pub name: String,
    pub database_key: String,
    pub sql: String,
    pub query_type: String,
    pub is_public: bool,
    pub registrator_id: Option<i64>,
}

impl QueryRecord {
    pub fn query_type(&self) -> ApiResult<QueryType> {
        Ok(self.query_type.parse()?)
    }

    /// Public queries are visible to everybody, private ones to their
    /// registrator and instance admins
    pub fn visible_to(&self, session: &Session) -> bool {
        self.is_public || self.registrator_id == Some(session.person_id) || session.is_instance_admin()
    }

    /// Only the registrator and instance admins may change a query
    pub fn authorize_change(&self, session: &Session) -> ApiResult<()> {
        if self.registrator_id == Some(session.person_id) || session.is_instance_admin() {
            Ok(())
        } else {
            Err(ApiError::unauthorized("QueryTechId", self.id))
        }
    }
}

pub async fn resolve(conn: &mut SqliteConnection, id: i64) -> ApiResult<Option<QueryRecord>> {
    let record = sqlx::query_as::<_, QueryRecord>(
        "SELECT id, name, database_key, sql, query_type, is_public, registrator_id FROM queries WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, id: i64) -> ApiResult<QueryRecord> {
    resolve(conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("QueryTechId", id))
}

/// Query databases as shown to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDatabaseView {
    pub perm_id: String,
    pub label: String,
    pub space: Option<String>,
    pub creator_minimal_role: Role,
}

impl From<&QueryDatabase> for QueryDatabaseView {
    fn from(db: &QueryDatabase) -> Self {
        Self {
            perm_id: db.key.clone(),
            label: db.label.clone(),
            space: db.space_code.clone(),
            creator_minimal_role: db.creator_minimal_role,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, SPACE_POWER_USER, SPACE_USER};

    #[tokio::test]
    async fn test_metadata_database_registered() {
        let ctx = TestContext::new().await;
        let databases = QueryDatabases::metadata_only(ctx.pool.clone(), &ctx.config);
        let db = databases.require("1").unwrap();
        assert_eq!(db.label, "openBIS meta data");
        assert!(databases.get("2").is_none());
        assert_eq!(
            databases.require("2").unwrap_err().to_string(),
            "Object with QueryDatabaseId = [2] has not been found"
        );
    }

    #[tokio::test]
    async fn test_space_bound_database_checks_space_role() {
        let ctx = TestContext::new().await;
        let mut config = Config::default();
        config.query_databases[0].space_code = Some("TEST-SPACE".into());
        config.query_databases[0].creator_minimal_role = Some(Role::PowerUser);
        let databases = QueryDatabases::metadata_only(ctx.pool.clone(), &config);
        let db = databases.require("1").unwrap();

        let power_user = ctx.session(SPACE_POWER_USER).await;
        let user = ctx.session(SPACE_USER).await;
        let mut conn = ctx.pool.acquire().await.unwrap();
        assert!(db.allows(&mut conn, &power_user).await.unwrap());
        assert!(!db.allows(&mut conn, &user).await.unwrap());
        let err = db.authorize(&mut conn, &user).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));
    }
}
