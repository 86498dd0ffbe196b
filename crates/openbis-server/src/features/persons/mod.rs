//! Persons: the users of the instance, addressed by user id

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::error::{ApiError, ApiResult};

pub use commands::{CreatePersonsCommand, DeletePersonsCommand, PersonCreation, PersonUpdate, UpdatePersonsCommand};
pub use queries::{GetPersonsQuery, Person, PersonFetchOptions, PersonSearchCriteria, SearchPersonsQuery};
pub use routes::persons_routes;

#[derive(Debug, Clone, FromRow)]
pub struct PersonRecord {
    pub id: i64,
    pub user_id: String,
    pub active: bool,
}

pub async fn resolve(conn: &mut SqliteConnection, user_id: &str) -> ApiResult<Option<PersonRecord>> {
    let record = sqlx::query_as::<_, PersonRecord>("SELECT id, user_id, active FROM persons WHERE user_id = ?")
        .bind(user_id.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, user_id: &str) -> ApiResult<PersonRecord> {
    resolve(conn, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("PersonPermId", user_id.trim()))
}

