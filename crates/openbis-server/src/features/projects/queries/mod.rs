pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{
    error::ApiResult,
    features::shared::{
        fetch::Fetched,
        identifiers::{experiment_identifier, project_identifier},
    },
};

pub use get::GetProjectsQuery;
pub use search::{ProjectSearchCriteria, SearchProjectsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFetchOptions {
    pub experiments: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub perm_id: String,
    pub identifier: String,
    pub code: String,
    pub space: String,
    pub description: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
    /// Experiment identifiers, trashed ones excluded
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub experiments: Fetched<Vec<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ProjectRow {
    pub id: i64,
    pub perm_id: String,
    pub code: String,
    pub space_id: i64,
    pub space_code: String,
    pub description: Option<String>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl ProjectRow {
    pub fn identifier(&self) -> String {
        project_identifier(&self.space_code, &self.code)
    }
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<ProjectRow>> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT p.id, p.perm_id, p.code, p.space_id, s.code AS space_code, p.description,
               r.user_id AS registrator, p.registration_date, p.modification_date
        FROM projects p
        JOIN spaces s ON s.id = p.space_id
        LEFT JOIN persons r ON r.id = p.registrator_id
        ORDER BY s.code, p.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn to_projects(
    conn: &mut SqliteConnection,
    rows: Vec<ProjectRow>,
    fetch: &ProjectFetchOptions,
) -> ApiResult<Vec<Project>> {
    let mut experiments: HashMap<i64, Vec<String>> = HashMap::new();
    if fetch.experiments {
        let all: Vec<(i64, String, String, String)> = sqlx::query_as(
            r#"
            SELECT e.project_id, s.code, p.code, e.code
            FROM experiments e
            JOIN projects p ON p.id = e.project_id
            JOIN spaces s ON s.id = p.space_id
            WHERE e.deletion_id IS NULL
            ORDER BY e.code
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;
        for (project_id, space, project, code) in all {
            experiments
                .entry(project_id)
                .or_default()
                .push(experiment_identifier(&space, &project, &code));
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| Project {
            identifier: row.identifier(),
            experiments: Fetched::when(fetch.experiments, || {
                experiments.remove(&row.id).unwrap_or_default()
            }),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            perm_id: row.perm_id,
            code: row.code,
            space: row.space_code,
            description: row.description,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
