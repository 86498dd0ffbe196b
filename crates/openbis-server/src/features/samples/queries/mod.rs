pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{
    error::ApiResult,
    features::{
        samples::relationships::{self, Annotations, LinkRow},
        shared::{
            fetch::Fetched,
            identifiers::{experiment_identifier, project_identifier, sample_identifier},
            properties::{self, PropertyMap},
            tags,
        },
    },
};

pub use get::GetSamplesQuery;
pub use search::{SampleSearchCriteria, SearchSamplesQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleFetchOptions {
    pub properties: bool,
    pub tags: bool,
    pub parents: bool,
    pub children: bool,
    pub components: bool,
    pub data_sets: bool,
    pub registrator: bool,
}

/// The other end of a parent or child link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedSample {
    pub perm_id: String,
    pub identifier: String,
    pub parent_annotations: Annotations,
    pub child_annotations: Annotations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub perm_id: String,
    pub identifier: String,
    pub code: String,
    #[serde(rename = "type")]
    pub type_code: String,
    /// Space code, `None` for shared samples
    pub space: Option<String>,
    /// Project identifier
    pub project: Option<String>,
    /// Experiment identifier
    pub experiment: Option<String>,
    /// Container identifier
    pub container: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub properties: Fetched<PropertyMap>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub tags: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub parents: Fetched<Vec<RelatedSample>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub children: Fetched<Vec<RelatedSample>>,
    /// Component identifiers
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub components: Fetched<Vec<String>>,
    /// Data set codes
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub data_sets: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SampleRow {
    pub id: i64,
    pub perm_id: String,
    pub code: String,
    pub type_code: String,
    pub space_id: Option<i64>,
    pub space_code: Option<String>,
    pub project_id: Option<i64>,
    pub project_code: Option<String>,
    pub experiment_code: Option<String>,
    pub experiment_project_code: Option<String>,
    pub experiment_space_code: Option<String>,
    pub container_id: Option<i64>,
    pub container_code: Option<String>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl SampleRow {
    pub fn identifier(&self) -> String {
        sample_identifier(
            self.space_code.as_deref(),
            self.project_code.as_deref(),
            self.container_code.as_deref(),
            &self.code,
        )
    }

    pub fn project_identifier(&self) -> Option<String> {
        match (&self.space_code, &self.project_code) {
            (Some(space), Some(project)) => Some(project_identifier(space, project)),
            _ => None,
        }
    }

    pub fn experiment_identifier(&self) -> Option<String> {
        match (&self.experiment_space_code, &self.experiment_project_code, &self.experiment_code) {
            (Some(space), Some(project), Some(code)) => Some(experiment_identifier(space, project, code)),
            _ => None,
        }
    }
}

/// Every live sample, ordered by code
pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<SampleRow>> {
    let rows = sqlx::query_as::<_, SampleRow>(
        r#"
        SELECT sa.id, sa.perm_id, sa.code, t.code AS type_code,
               sa.space_id, s.code AS space_code, sa.project_id, p.code AS project_code,
               e.code AS experiment_code, ep.code AS experiment_project_code,
               es.code AS experiment_space_code,
               sa.container_id, c.code AS container_code,
               r.user_id AS registrator, sa.registration_date, sa.modification_date
        FROM samples sa
        JOIN entity_types t ON t.id = sa.type_id
        LEFT JOIN spaces s ON s.id = sa.space_id
        LEFT JOIN projects p ON p.id = sa.project_id
        LEFT JOIN experiments e ON e.id = sa.experiment_id
        LEFT JOIN projects ep ON ep.id = e.project_id
        LEFT JOIN spaces es ON es.id = ep.space_id
        LEFT JOIN samples c ON c.id = sa.container_id
        LEFT JOIN persons r ON r.id = sa.registrator_id
        WHERE sa.deletion_id IS NULL
        ORDER BY sa.code, sa.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

fn related(
    links: Option<&Vec<LinkRow>>,
    other_end: impl Fn(&LinkRow) -> i64,
    known: &HashMap<i64, (String, String)>,
) -> ApiResult<Vec<RelatedSample>> {
    let mut result = Vec::new();
    for link in links.into_iter().flatten() {
        let Some((perm_id, identifier)) = known.get(&other_end(link)) else {
            continue;
        };
        let (parent_annotations, child_annotations) = link.annotations()?;
        result.push(RelatedSample {
            perm_id: perm_id.clone(),
            identifier: identifier.clone(),
            parent_annotations,
            child_annotations,
        });
    }
    result.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(result)
}

async fn data_sets_by_sample(conn: &mut SqliteConnection) -> ApiResult<HashMap<i64, Vec<String>>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT sample_id, code FROM data_sets WHERE sample_id IS NOT NULL AND deletion_id IS NULL ORDER BY code",
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut result: HashMap<i64, Vec<String>> = HashMap::new();
    for (sample_id, code) in rows {
        result.entry(sample_id).or_default().push(code);
    }
    Ok(result)
}

pub(crate) async fn to_samples(
    conn: &mut SqliteConnection,
    rows: Vec<SampleRow>,
    fetch: &SampleFetchOptions,
) -> ApiResult<Vec<Sample>> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut values = if fetch.properties {
        properties::load(conn, EntityKind::Sample, &ids).await?
    } else {
        HashMap::new()
    };
    let mut tag_ids = if fetch.tags {
        tags::load(conn, EntityKind::Sample, &ids).await?
    } else {
        HashMap::new()
    };
    let (by_child, by_parent) = if fetch.parents || fetch.children {
        relationships::load(conn, &ids).await?
    } else {
        Default::default()
    };
    let needs_all = fetch.parents
        || fetch.children
        || fetch.components
        || rows.iter().any(|row| row.container_id.is_some());
    let everything = if needs_all { load_rows(conn).await? } else { Vec::new() };
    let known: HashMap<i64, (String, String)> = everything
        .iter()
        .map(|row| (row.id, (row.perm_id.clone(), row.identifier())))
        .collect();
    let mut components: HashMap<i64, Vec<String>> = HashMap::new();
    for row in &everything {
        if let Some(container_id) = row.container_id {
            components.entry(container_id).or_default().push(row.identifier());
        }
    }
    let mut data_sets = if fetch.data_sets {
        data_sets_by_sample(conn).await?
    } else {
        HashMap::new()
    };

    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        let parents = if fetch.parents {
            Fetched::Value(related(by_child.get(&row.id), |link| link.parent_id, &known)?)
        } else {
            Fetched::NotFetched
        };
        let children = if fetch.children {
            Fetched::Value(related(by_parent.get(&row.id), |link| link.child_id, &known)?)
        } else {
            Fetched::NotFetched
        };
        samples.push(Sample {
            identifier: row.identifier(),
            project: row.project_identifier(),
            experiment: row.experiment_identifier(),
            container: row.container_id.and_then(|id| known.get(&id).map(|(_, identifier)| identifier.clone())),
            properties: Fetched::when(fetch.properties, || values.remove(&row.id).unwrap_or_default()),
            tags: Fetched::when(fetch.tags, || tag_ids.remove(&row.id).unwrap_or_default()),
            parents,
            children,
            components: Fetched::when(fetch.components, || components.remove(&row.id).unwrap_or_default()),
            data_sets: Fetched::when(fetch.data_sets, || data_sets.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            perm_id: row.perm_id,
            code: row.code,
            type_code: row.type_code,
            space: row.space_code,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        });
    }
    Ok(samples)
}
