pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{
    error::ApiResult,
    features::shared::{
        fetch::Fetched,
        identifiers::{experiment_identifier, project_identifier, sample_identifier},
        properties::{self, PropertyMap},
        tags,
    },
};

pub use get::GetExperimentsQuery;
pub use search::{ExperimentSearchCriteria, SearchExperimentsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentFetchOptions {
    pub properties: bool,
    pub tags: bool,
    pub samples: bool,
    pub data_sets: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub perm_id: String,
    pub identifier: String,
    pub code: String,
    #[serde(rename = "type")]
    pub type_code: String,
    /// Project identifier
    pub project: String,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub properties: Fetched<PropertyMap>,
    /// Tag perm ids
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub tags: Fetched<Vec<String>>,
    /// Sample identifiers
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub samples: Fetched<Vec<String>>,
    /// Data set codes
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub data_sets: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ExperimentRow {
    pub id: i64,
    pub perm_id: String,
    pub code: String,
    pub type_code: String,
    pub project_id: i64,
    pub project_code: String,
    pub space_id: i64,
    pub space_code: String,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl ExperimentRow {
    pub fn identifier(&self) -> String {
        experiment_identifier(&self.space_code, &self.project_code, &self.code)
    }
}

/// Every live experiment, ordered by identifier
pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<ExperimentRow>> {
    let rows = sqlx::query_as::<_, ExperimentRow>(
        r#"
        SELECT e.id, e.perm_id, e.code, t.code AS type_code, e.project_id, p.code AS project_code,
               p.space_id, s.code AS space_code, r.user_id AS registrator,
               e.registration_date, e.modification_date
        FROM experiments e
        JOIN entity_types t ON t.id = e.type_id
        JOIN projects p ON p.id = e.project_id
        JOIN spaces s ON s.id = p.space_id
        LEFT JOIN persons r ON r.id = e.registrator_id
        WHERE e.deletion_id IS NULL
        ORDER BY s.code, p.code, e.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

async fn samples_by_experiment(conn: &mut SqliteConnection) -> ApiResult<HashMap<i64, Vec<String>>> {
    let rows: Vec<(i64, Option<String>, Option<String>, Option<String>, String)> = sqlx::query_as(
        r#"
        SELECT sa.experiment_id, s.code, p.code, c.code, sa.code
        FROM samples sa
        LEFT JOIN spaces s ON s.id = sa.space_id
        LEFT JOIN projects p ON p.id = sa.project_id
        LEFT JOIN samples c ON c.id = sa.container_id
        WHERE sa.experiment_id IS NOT NULL AND sa.deletion_id IS NULL
        ORDER BY sa.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut result: HashMap<i64, Vec<String>> = HashMap::new();
    for (experiment_id, space, project, container, code) in rows {
        result.entry(experiment_id).or_default().push(sample_identifier(
            space.as_deref(),
            project.as_deref(),
            container.as_deref(),
            &code,
        ));
    }
    Ok(result)
}

async fn data_sets_by_experiment(conn: &mut SqliteConnection) -> ApiResult<HashMap<i64, Vec<String>>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT experiment_id, code FROM data_sets WHERE experiment_id IS NOT NULL AND deletion_id IS NULL ORDER BY code",
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut result: HashMap<i64, Vec<String>> = HashMap::new();
    for (experiment_id, code) in rows {
        result.entry(experiment_id).or_default().push(code);
    }
    Ok(result)
}

pub(crate) async fn to_experiments(
    conn: &mut SqliteConnection,
    rows: Vec<ExperimentRow>,
    fetch: &ExperimentFetchOptions,
) -> ApiResult<Vec<Experiment>> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut values = if fetch.properties {
        properties::load(conn, EntityKind::Experiment, &ids).await?
    } else {
        HashMap::new()
    };
    let mut tag_ids = if fetch.tags {
        tags::load(conn, EntityKind::Experiment, &ids).await?
    } else {
        HashMap::new()
    };
    let mut samples = if fetch.samples {
        samples_by_experiment(conn).await?
    } else {
        HashMap::new()
    };
    let mut data_sets = if fetch.data_sets {
        data_sets_by_experiment(conn).await?
    } else {
        HashMap::new()
    };

    Ok(rows
        .into_iter()
        .map(|row| Experiment {
            identifier: row.identifier(),
            project: project_identifier(&row.space_code, &row.project_code),
            properties: Fetched::when(fetch.properties, || values.remove(&row.id).unwrap_or_default()),
            tags: Fetched::when(fetch.tags, || tag_ids.remove(&row.id).unwrap_or_default()),
            samples: Fetched::when(fetch.samples, || samples.remove(&row.id).unwrap_or_default()),
            data_sets: Fetched::when(fetch.data_sets, || data_sets.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            perm_id: row.perm_id,
            code: row.code,
            type_code: row.type_code,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
