pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{error::ApiResult, features::shared::fetch::Fetched};

pub use get::GetPersonsQuery;
pub use search::{PersonSearchCriteria, SearchPersonsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonFetchOptions {
    pub home_space: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub perm_id: String,
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub registration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub home_space: Fetched<Option<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PersonRow {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub registration_date: DateTime<Utc>,
    pub home_space: Option<String>,
    pub registrator: Option<String>,
}

impl PersonRow {
    pub fn into_person(self, fetch: &PersonFetchOptions) -> Person {
        Person {
            perm_id: self.user_id.clone(),
            home_space: Fetched::when(fetch.home_space, || self.home_space.clone()),
            registrator: Fetched::when(fetch.registrator, || self.registrator.clone()),
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            active: self.active,
            registration_date: self.registration_date,
        }
    }
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<PersonRow>> {
    let rows = sqlx::query_as::<_, PersonRow>(
        r#"
        SELECT p.user_id, p.first_name, p.last_name, p.email, p.active, p.registration_date,
               s.code AS home_space, r.user_id AS registrator
        FROM persons p
        LEFT JOIN spaces s ON s.id = p.home_space_id
        LEFT JOIN persons r ON r.id = p.registrator_id
        ORDER BY p.user_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
