//! Data sets: typed data attached to an experiment, a sample or both
//!
//! A data set is addressed by its code, which doubles as its perm id. The
//! kind decides what else it carries. PHYSICAL data sets have a location in
//! a store share, CONTAINER data sets group components and LINK data sets
//! point at content copies held by external data management systems.

pub mod commands;
pub mod linked_data;
pub mod queries;
pub mod relationships;
pub mod routes;

use openbis_common::types::{DataSetKind, Role};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    auth::{authorization::require_context, Session},
    error::{ApiError, ApiResult},
};

pub use commands::{
    CreateDataSetsCommand, DataSetCreation, DataSetUpdate, DeleteDataSetsCommand, PhysicalDataCreation,
    UpdateDataSetsCommand,
};
pub use linked_data::{
    ContentCopy, ContentCopyCreation, ContentCopyHistoryEntry, ContentCopyListUpdate, LinkedData, LinkedDataCreation,
    LinkedDataUpdate,
};
pub use queries::{
    DataSet, DataSetFetchOptions, DataSetSearchCriteria, GetDataSetsQuery, PhysicalData, SearchDataSetsQuery,
};
pub use routes::data_sets_routes;

#[derive(Debug, Clone, FromRow)]
pub struct DataSetRecord {
    pub id: i64,
    pub code: String,
    pub type_id: i64,
    pub type_code: String,
    pub type_attributes: String,
    pub kind: String,
    pub experiment_id: Option<i64>,
    pub sample_id: Option<i64>,
    pub space_id: Option<i64>,
    pub project_id: Option<i64>,
}

impl DataSetRecord {
    pub fn kind(&self) -> ApiResult<DataSetKind> {
        Ok(self.kind.parse()?)
    }

    /// Require `role` in the space or project the data set belongs to
    pub fn authorize(&self, session: &Session, role: Role) -> ApiResult<()> {
        require_context(session, self.space_id, self.project_id, "DataSetPermId", &self.code, role)
    }
}

/// Space and project come from the experiment, or from the sample when the
/// data set has no experiment
const RESOLVE_SQL: &str = r#"
    SELECT d.id, d.code, d.type_id, t.code AS type_code, t.attributes AS type_attributes, d.kind,
           d.experiment_id, d.sample_id,
           COALESCE(p.space_id, sa.space_id) AS space_id,
           COALESCE(e.project_id, sa.project_id) AS project_id
    FROM data_sets d
    JOIN entity_types t ON t.id = d.type_id
    LEFT JOIN experiments e ON e.id = d.experiment_id
    LEFT JOIN projects p ON p.id = e.project_id
    LEFT JOIN samples sa ON sa.id = d.sample_id
"#;

pub(crate) fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Look a live data set up by code
pub async fn resolve(conn: &mut SqliteConnection, code: &str) -> ApiResult<Option<DataSetRecord>> {
    let record = sqlx::query_as::<_, DataSetRecord>(&format!(
        "{} WHERE d.code = ? AND d.deletion_id IS NULL",
        RESOLVE_SQL
    ))
    .bind(normalize(code))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, code: &str) -> ApiResult<DataSetRecord> {
    resolve(conn, code)
        .await?
        .ok_or_else(|| ApiError::not_found("DataSetPermId", normalize(code)))
}

pub(crate) async fn require_all(conn: &mut SqliteConnection, codes: &[String]) -> ApiResult<Vec<DataSetRecord>> {
    let mut records = Vec::with_capacity(codes.len());
    for code in codes {
        records.push(require(conn, code).await?);
    }
    Ok(records)
}
