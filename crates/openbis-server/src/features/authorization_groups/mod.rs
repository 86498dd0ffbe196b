//! Authorization groups: named sets of persons that receive roles together

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::{ApiError, ApiResult},
    features::persons,
};

pub use commands::{
    AuthorizationGroupCreation, AuthorizationGroupUpdate, CreateAuthorizationGroupsCommand,
    DeleteAuthorizationGroupsCommand, UpdateAuthorizationGroupsCommand,
};
pub use queries::{
    AuthorizationGroup, AuthorizationGroupFetchOptions, AuthorizationGroupSearchCriteria, GetAuthorizationGroupsQuery,
    SearchAuthorizationGroupsQuery,
};
pub use routes::authorization_groups_routes;

#[derive(Debug, Clone, FromRow)]
pub struct GroupRecord {
    pub id: i64,
    pub code: String,
}

pub async fn resolve(conn: &mut SqliteConnection, code: &str) -> ApiResult<Option<GroupRecord>> {
    let record = sqlx::query_as::<_, GroupRecord>("SELECT id, code FROM authorization_groups WHERE code = ?")
        .bind(code.trim().to_uppercase())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, code: &str) -> ApiResult<GroupRecord> {
    resolve(conn, code)
        .await?
        .ok_or_else(|| ApiError::not_found("AuthorizationGroupPermId", code.trim().to_uppercase()))
}

/// Person row ids for user ids, failing on the first unknown one
pub(crate) async fn person_ids(conn: &mut SqliteConnection, user_ids: &[String]) -> ApiResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        ids.push(persons::require(conn, user_id).await?.id);
    }
    Ok(ids)
}

pub(crate) async fn members(conn: &mut SqliteConnection, group_id: i64) -> ApiResult<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT person_id FROM authorization_group_persons WHERE group_id = ?")
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}
