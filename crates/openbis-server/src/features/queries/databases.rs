//! Listing the query databases a caller may run queries on

use sqlx::SqlitePool;

use super::{QueryDatabaseView, QueryDatabases};
use crate::{access_log, auth::Session, error::ApiResult};

#[tracing::instrument(skip_all, fields(user = %session.user_id))]
pub async fn list(pool: &SqlitePool, session: &Session, databases: &QueryDatabases) -> ApiResult<Vec<QueryDatabaseView>> {
    access_log::record(&session.user_id, "list-query-databases", &[]);

    let mut conn = pool.acquire().await?;
    let mut allowed = Vec::new();
    for database in databases.iter() {
        if database.allows(&mut conn, session).await? {
            allowed.push(QueryDatabaseView::from(database));
        }
    }
    Ok(allowed)
}
