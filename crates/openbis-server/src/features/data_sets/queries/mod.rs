pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::{DataSetKind, EntityKind};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::{
    error::ApiResult,
    features::{
        data_sets::{
            linked_data::{self, ContentCopyHistoryEntry, LinkedData},
            relationships::{self, Link},
        },
        shared::{
            fetch::Fetched,
            identifiers::{experiment_identifier, sample_identifier},
            properties::{self, PropertyMap},
            tags,
        },
    },
};

pub use get::GetDataSetsQuery;
pub use search::{DataSetSearchCriteria, SearchDataSetsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetFetchOptions {
    pub properties: bool,
    pub tags: bool,
    pub parents: bool,
    pub children: bool,
    pub containers: bool,
    pub components: bool,
    pub physical_data: bool,
    pub linked_data: bool,
    /// Superseded content copies
    pub history: bool,
    pub registrator: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalData {
    pub location: String,
    pub share_id: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSet {
    pub perm_id: String,
    pub code: String,
    #[serde(rename = "type")]
    pub type_code: String,
    pub kind: DataSetKind,
    /// Experiment identifier
    pub experiment: Option<String>,
    /// Sample identifier
    pub sample: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub properties: Fetched<PropertyMap>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub tags: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub parents: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub children: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub containers: Fetched<Vec<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub components: Fetched<Vec<String>>,
    /// `None` unless the data set is PHYSICAL
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub physical_data: Fetched<Option<PhysicalData>>,
    /// `None` unless the data set is a LINK
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub linked_data: Fetched<Option<LinkedData>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub history: Fetched<Vec<ContentCopyHistoryEntry>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct DataSetRow {
    pub id: i64,
    pub code: String,
    pub type_code: String,
    pub kind: String,
    pub space_id: Option<i64>,
    pub project_id: Option<i64>,
    pub space_code: Option<String>,
    pub experiment_space_code: Option<String>,
    pub experiment_project_code: Option<String>,
    pub experiment_code: Option<String>,
    pub sample_space_code: Option<String>,
    pub sample_project_code: Option<String>,
    pub sample_container_code: Option<String>,
    pub sample_code: Option<String>,
    pub location: Option<String>,
    pub share_id: Option<String>,
    pub size: Option<i64>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl DataSetRow {
    pub fn experiment_identifier(&self) -> Option<String> {
        match (&self.experiment_space_code, &self.experiment_project_code, &self.experiment_code) {
            (Some(space), Some(project), Some(code)) => Some(experiment_identifier(space, project, code)),
            _ => None,
        }
    }

    pub fn sample_identifier(&self) -> Option<String> {
        self.sample_code.as_deref().map(|code| {
            sample_identifier(
                self.sample_space_code.as_deref(),
                self.sample_project_code.as_deref(),
                self.sample_container_code.as_deref(),
                code,
            )
        })
    }

    fn physical_data(&self) -> Option<PhysicalData> {
        self.location.as_ref().map(|location| PhysicalData {
            location: location.clone(),
            share_id: self.share_id.clone(),
            size: self.size,
        })
    }
}

/// Every live data set, ordered by code
pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<DataSetRow>> {
    let rows = sqlx::query_as::<_, DataSetRow>(
        r#"
        SELECT d.id, d.code, t.code AS type_code, d.kind,
               COALESCE(ep.space_id, sa.space_id) AS space_id,
               COALESCE(e.project_id, sa.project_id) AS project_id,
               COALESCE(es.code, ss.code) AS space_code,
               es.code AS experiment_space_code, ep.code AS experiment_project_code,
               e.code AS experiment_code,
               ss.code AS sample_space_code, sp.code AS sample_project_code,
               sc.code AS sample_container_code, sa.code AS sample_code,
               d.location, d.share_id, d.size,
               r.user_id AS registrator, d.registration_date, d.modification_date
        FROM data_sets d
        JOIN entity_types t ON t.id = d.type_id
        LEFT JOIN experiments e ON e.id = d.experiment_id
        LEFT JOIN projects ep ON ep.id = e.project_id
        LEFT JOIN spaces es ON es.id = ep.space_id
        LEFT JOIN samples sa ON sa.id = d.sample_id
        LEFT JOIN spaces ss ON ss.id = sa.space_id
        LEFT JOIN projects sp ON sp.id = sa.project_id
        LEFT JOIN samples sc ON sc.id = sa.container_id
        LEFT JOIN persons r ON r.id = d.registrator_id
        WHERE d.deletion_id IS NULL
        ORDER BY d.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Codes on both ends of every live link, grouped by upper and by lower end
async fn linked_codes(
    conn: &mut SqliteConnection,
    link: Link,
    codes: &HashMap<i64, String>,
) -> ApiResult<(HashMap<i64, Vec<String>>, HashMap<i64, Vec<String>>)> {
    let mut lowers: HashMap<i64, Vec<String>> = HashMap::new();
    let mut uppers: HashMap<i64, Vec<String>> = HashMap::new();
    for (upper, lower) in relationships::load(conn, link).await? {
        if let (Some(upper_code), Some(lower_code)) = (codes.get(&upper), codes.get(&lower)) {
            lowers.entry(upper).or_default().push(lower_code.clone());
            uppers.entry(lower).or_default().push(upper_code.clone());
        }
    }
    for list in lowers.values_mut().chain(uppers.values_mut()) {
        list.sort();
    }
    Ok((lowers, uppers))
}

pub(crate) async fn to_data_sets(
    conn: &mut SqliteConnection,
    rows: Vec<DataSetRow>,
    fetch: &DataSetFetchOptions,
) -> ApiResult<Vec<DataSet>> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut values = if fetch.properties {
        properties::load(conn, EntityKind::DataSet, &ids).await?
    } else {
        HashMap::new()
    };
    let mut tag_ids = if fetch.tags {
        tags::load(conn, EntityKind::DataSet, &ids).await?
    } else {
        HashMap::new()
    };

    let needs_codes = fetch.parents || fetch.children || fetch.containers || fetch.components;
    let codes: HashMap<i64, String> = if needs_codes {
        sqlx::query_as::<_, (i64, String)>("SELECT id, code FROM data_sets WHERE deletion_id IS NULL")
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect()
    } else {
        HashMap::new()
    };
    let (mut children, mut parents) = if fetch.parents || fetch.children {
        linked_codes(conn, Link::Lineage, &codes).await?
    } else {
        Default::default()
    };
    let (mut components, mut containers) = if fetch.containers || fetch.components {
        linked_codes(conn, Link::Containment, &codes).await?
    } else {
        Default::default()
    };

    let mut copies = if fetch.linked_data {
        linked_data::load(conn, &ids).await?
    } else {
        HashMap::new()
    };
    let mut history = if fetch.history {
        linked_data::history(conn, &ids).await?
    } else {
        HashMap::new()
    };

    let mut data_sets = Vec::with_capacity(rows.len());
    for row in rows {
        let kind: DataSetKind = row.kind.parse()?;
        let physical_data = Fetched::when(fetch.physical_data, || match kind {
            DataSetKind::Physical => row.physical_data(),
            _ => None,
        });
        let linked = Fetched::when(fetch.linked_data, || match kind {
            DataSetKind::Link => Some(LinkedData::from_copies(copies.remove(&row.id).unwrap_or_default())),
            _ => None,
        });
        data_sets.push(DataSet {
            experiment: row.experiment_identifier(),
            sample: row.sample_identifier(),
            properties: Fetched::when(fetch.properties, || values.remove(&row.id).unwrap_or_default()),
            tags: Fetched::when(fetch.tags, || tag_ids.remove(&row.id).unwrap_or_default()),
            parents: Fetched::when(fetch.parents, || parents.remove(&row.id).unwrap_or_default()),
            children: Fetched::when(fetch.children, || children.remove(&row.id).unwrap_or_default()),
            containers: Fetched::when(fetch.containers, || containers.remove(&row.id).unwrap_or_default()),
            components: Fetched::when(fetch.components, || components.remove(&row.id).unwrap_or_default()),
            physical_data,
            linked_data: linked,
            history: Fetched::when(fetch.history, || history.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            perm_id: row.code.clone(),
            code: row.code,
            type_code: row.type_code,
            kind,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        });
    }
    Ok(data_sets)
}
