pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{
    error::ApiResult,
    features::shared::{fetch::Fetched, identifiers::project_identifier},
};

pub use get::GetSpacesQuery;
pub use search::{SearchSpacesQuery, SpaceSearchCriteria};

/// Relations loaded on request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceFetchOptions {
    pub projects: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub perm_id: String,
    pub code: String,
    pub description: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
    /// Project identifiers
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub projects: Fetched<Vec<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SpaceRow {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<SpaceRow>> {
    let rows = sqlx::query_as::<_, SpaceRow>(
        r#"
        SELECT s.id, s.code, s.description, p.user_id AS registrator,
               s.registration_date, s.modification_date
        FROM spaces s
        LEFT JOIN persons p ON p.id = s.registrator_id
        ORDER BY s.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn to_spaces(
    conn: &mut SqliteConnection,
    rows: Vec<SpaceRow>,
    fetch: &SpaceFetchOptions,
) -> ApiResult<Vec<Space>> {
    let mut projects: HashMap<i64, Vec<String>> = HashMap::new();
    if fetch.projects {
        let all: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT p.space_id, s.code, p.code FROM projects p JOIN spaces s ON s.id = p.space_id ORDER BY p.code",
        )
        .fetch_all(&mut *conn)
        .await?;
        for (space_id, space_code, project_code) in all {
            projects
                .entry(space_id)
                .or_default()
                .push(project_identifier(&space_code, &project_code));
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| Space {
            perm_id: row.code.clone(),
            projects: Fetched::when(fetch.projects, || {
                projects.remove(&row.id).unwrap_or_default()
            }),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            code: row.code,
            description: row.description,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
