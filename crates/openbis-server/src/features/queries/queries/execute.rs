//! Running stored queries and ad hoc SQL
//!
//! Authorization happens on the metadata connection, which is released
//! before the statement runs: the metadata query database shares that pool.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        queries::{
            self,
            sql::{bind, TableModel},
            QueryDatabases,
        },
        shared::validation::require_non_empty,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteQueryCommand {
    pub query_id: i64,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSqlCommand {
    pub sql: Option<String>,
    pub database_id: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

fn bindings_repr(parameters: &BTreeMap<String, String>) -> String {
    let pairs: Vec<String> = parameters.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{{{}}}", pairs.join(", "))
}

/// Run a stored query the caller can see with the given variable values
#[tracing::instrument(skip_all, fields(user = %session.user_id, query = command.query_id))]
pub async fn execute_query(
    pool: &SqlitePool,
    session: &Session,
    databases: &QueryDatabases,
    command: ExecuteQueryCommand,
) -> ApiResult<TableModel> {
    access_log::record(
        &session.user_id,
        "execute-query",
        &[
            ("QUERY_ID", command.query_id.log_repr()),
            ("BINDINGS", bindings_repr(&command.parameters)),
        ],
    );

    let (database, sql) = {
        let mut conn = pool.acquire().await?;
        let record = queries::require(&mut conn, command.query_id).await?;
        if !record.visible_to(session) {
            return Err(ApiError::unauthorized("QueryTechId", record.id));
        }
        let database = databases.require(&record.database_key)?;
        database.authorize(&mut conn, session).await?;
        (database, record.sql)
    };

    let statement = bind(&sql, &command.parameters)?;
    let model = database.run(&statement).await?;
    tracing::debug!(rows = model.rows.len(), database = %database.key, "Query executed");
    Ok(model)
}

/// Run an ad hoc select statement on a query database
#[tracing::instrument(skip_all, fields(user = %session.user_id))]
pub async fn execute_sql(
    pool: &SqlitePool,
    session: &Session,
    databases: &QueryDatabases,
    command: ExecuteSqlCommand,
) -> ApiResult<TableModel> {
    access_log::record(
        &session.user_id,
        "execute-sql",
        &[
            ("SQL", command.sql.log_repr()),
            ("DATABASE_ID", command.database_id.log_repr()),
            ("BINDINGS", bindings_repr(&command.parameters)),
        ],
    );

    let sql = require_non_empty(command.sql.as_deref(), "Sql")?;
    let database = databases.require(require_non_empty(command.database_id.as_deref(), "Database id")?)?;
    let statement = bind(sql, &command.parameters)?;
    {
        let mut conn = pool.acquire().await?;
        database.authorize(&mut conn, session).await?;
    }

    let model = database.run(&statement).await?;
    tracing::debug!(rows = model.rows.len(), database = %database.key, "Sql executed");
    Ok(model)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        queries::commands::create::{self, CreateQueriesCommand, QueryCreation},
        shared::test_helpers::{TestContext, INSTANCE_OBSERVER, SPACE_USER},
    };
    use serde_json::json;

    fn sql(statement: &str) -> ExecuteSqlCommand {
        ExecuteSqlCommand {
            sql: Some(statement.into()),
            database_id: Some("1".into()),
            parameters: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_space_codes_from_metadata_database() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let databases = ctx.state().query_databases;

        let model = execute_sql(&ctx.pool, &admin, &databases, sql("SELECT code FROM spaces ORDER BY code"))
            .await
            .unwrap();
        assert_eq!(model.columns.len(), 1);
        assert_eq!(model.columns[0].title, "code");
        assert_eq!(
            model.rows,
            vec![vec![json!("CISD")], vec![json!("TEST-SPACE")], vec![json!("TESTGROUP")]]
        );
    }

    #[tokio::test]
    async fn test_statement_checks() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let databases = ctx.state().query_databases;

        let err = execute_sql(&ctx.pool, &admin, &databases, sql("SELECT 1; DELETE FROM spaces"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("only one query statement is allowed"));

        let err = execute_sql(&ctx.pool, &admin, &databases, sql("DELETE FROM spaces"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("only select statements are allowed"));

        let err = execute_sql(&ctx.pool, &admin, &databases, sql("SELECT * FROM spaces WHERE code = ${code}"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("variables are not bound"));

        let mut command = sql("SELECT code FROM spaces");
        command.parameters.insert("code".into(), "CISD".into());
        let err = execute_sql(&ctx.pool, &admin, &databases, command).await.unwrap_err();
        assert!(err.to_string().contains("Unknown variable"));

        assert_eq!(ctx.count("SELECT COUNT(*) FROM spaces").await, 3);
    }

    #[tokio::test]
    async fn test_stored_query_with_parameters() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let databases = ctx.state().query_databases;
        let creation = QueryCreation {
            public: true,
            ..QueryCreation::new(
                "SPACE_BY_CODE",
                "1",
                "SELECT code, description FROM spaces WHERE code = ${code}",
            )
        };
        let id = create::handle(&ctx.pool, &admin, &databases, CreateQueriesCommand { creations: vec![creation] })
            .await
            .unwrap()[0];

        let observer = ctx.session(INSTANCE_OBSERVER).await;
        let command = ExecuteQueryCommand {
            query_id: id,
            parameters: BTreeMap::from([("code".to_string(), "CISD".to_string())]),
        };
        let err = execute_query(&ctx.pool, &observer, &databases, command.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));

        let model = execute_query(&ctx.pool, &admin, &databases, command).await.unwrap();
        assert_eq!(model.rows, vec![vec![json!("CISD"), json!("Default space")]]);
        assert_eq!(model.column("description").unwrap(), vec![&json!("Default space")]);
    }

    #[tokio::test]
    async fn test_credentials_never_readable() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let databases = ctx.state().query_databases;

        for statement in [
            "SELECT token_digest FROM sessions",
            "SELECT p.user_id, c.password_hash FROM persons p JOIN credentials c ON c.person_id = p.id",
        ] {
            let err = execute_sql(&ctx.pool, &admin, &databases, sql(statement)).await.unwrap_err();
            assert!(matches!(err, ApiError::AuthorizationFailure(_)), "{}", statement);
        }
        let model = execute_sql(&ctx.pool, &admin, &databases, sql("SELECT user_id FROM persons WHERE user_id = 'admin'"))
            .await
            .unwrap();
        assert_eq!(model.rows, vec![vec![json!("admin")]]);
    }

    #[tokio::test]
    async fn test_metadata_database_needs_instance_admin() {
        let ctx = TestContext::new().await;
        sqlx::query(
            "INSERT INTO role_assignments (role, person_id, registration_date) \
             SELECT 'POWER_USER', id, '2026-01-01T00:00:00Z' FROM persons WHERE user_id = ?",
        )
        .bind(SPACE_USER)
        .execute(&ctx.pool)
        .await
        .unwrap();
        let power_user = ctx.session(SPACE_USER).await;
        let databases = ctx.state().query_databases;

        let err = execute_sql(&ctx.pool, &power_user, &databases, sql("SELECT code FROM spaces"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));
    }

    #[tokio::test]
    async fn test_space_user_rejected_on_instance_database() {
        let ctx = TestContext::new().await;
        let user = ctx.session(SPACE_USER).await;
        let databases = ctx.state().query_databases;
        let err = execute_sql(&ctx.pool, &user, &databases, sql("SELECT code FROM spaces"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));
    }
}
