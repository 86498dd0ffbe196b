//! Samples: typed entities living in a space, a project, or shared by the
//! whole instance
//!
//! A sample may belong to an experiment, sit inside a container sample and
//! have any number of parents and children. Identifiers are `/SPACE/CODE`,
//! `/SPACE/PROJECT/CODE` or `/CODE`, with component codes written
//! `CONTAINER:CODE`.

pub mod commands;
pub mod queries;
pub mod relationships;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::{ApiError, ApiResult},
    features::shared::{identifiers::sample_identifier, EntityRef},
};

pub use commands::{
    CreateSamplesCommand, DeleteSamplesCommand, SampleCreation, SampleUpdate, UpdateSamplesCommand,
};
pub use queries::{GetSamplesQuery, RelatedSample, Sample, SampleFetchOptions, SampleSearchCriteria, SearchSamplesQuery};
pub use relationships::{Annotations, Relationship};
pub use routes::samples_routes;

#[derive(Debug, Clone, FromRow)]
pub struct SampleRecord {
    pub id: i64,
    pub perm_id: String,
    pub code: String,
    pub type_id: i64,
    pub type_code: String,
    pub space_id: Option<i64>,
    pub space_code: Option<String>,
    pub project_id: Option<i64>,
    pub project_code: Option<String>,
    pub experiment_id: Option<i64>,
    pub container_id: Option<i64>,
    pub container_code: Option<String>,
}

impl SampleRecord {
    pub fn identifier(&self) -> String {
        sample_identifier(
            self.space_code.as_deref(),
            self.project_code.as_deref(),
            self.container_code.as_deref(),
            &self.code,
        )
    }

    /// Name of the id kind used to refer to this sample in errors
    pub fn describe(&self, id: &EntityRef) -> (&'static str, String) {
        match id {
            EntityRef::PermId(_) => ("SamplePermId", self.perm_id.clone()),
            EntityRef::Identifier(_) => ("SampleIdentifier", self.identifier()),
        }
    }
}

pub(crate) const RESOLVE_SQL: &str = r#"
    SELECT sa.id, sa.perm_id, sa.code, sa.type_id, t.code AS type_code,
           sa.space_id, s.code AS space_code, sa.project_id, p.code AS project_code,
           sa.experiment_id, sa.container_id, c.code AS container_code
    FROM samples sa
    JOIN entity_types t ON t.id = sa.type_id
    LEFT JOIN spaces s ON s.id = sa.space_id
    LEFT JOIN projects p ON p.id = sa.project_id
    LEFT JOIN samples c ON c.id = sa.container_id
"#;

/// Samples whose code is `code`, trashed ones only when `include_trashed`
pub(crate) async fn with_code(
    conn: &mut SqliteConnection,
    code: &str,
    include_trashed: bool,
) -> ApiResult<Vec<SampleRecord>> {
    let filter = if include_trashed { "" } else { " AND sa.deletion_id IS NULL" };
    let records = sqlx::query_as::<_, SampleRecord>(&format!("{} WHERE sa.code = ?{}", RESOLVE_SQL, filter))
        .bind(code)
        .fetch_all(&mut *conn)
        .await?;
    Ok(records)
}

/// Look a live sample up by perm id or identifier
pub async fn resolve(conn: &mut SqliteConnection, id: &EntityRef) -> ApiResult<Option<SampleRecord>> {
    match id {
        EntityRef::PermId(perm_id) => {
            let record = sqlx::query_as::<_, SampleRecord>(&format!(
                "{} WHERE sa.perm_id = ? AND sa.deletion_id IS NULL",
                RESOLVE_SQL
            ))
            .bind(perm_id.trim())
            .fetch_optional(&mut *conn)
            .await?;
            Ok(record)
        },
        EntityRef::Identifier(identifier) => {
            let wanted = identifier.trim().to_uppercase();
            let local = wanted.rsplit('/').next().unwrap_or_default();
            let code = local.rsplit(':').next().unwrap_or(local);
            Ok(with_code(conn, code, false)
                .await?
                .into_iter()
                .find(|record| record.identifier() == wanted))
        },
    }
}

pub async fn require(conn: &mut SqliteConnection, id: &EntityRef) -> ApiResult<SampleRecord> {
    let kind = match id {
        EntityRef::PermId(_) => "SamplePermId",
        EntityRef::Identifier(_) => "SampleIdentifier",
    };
    resolve(conn, id).await?.ok_or_else(|| ApiError::not_found(kind, id))
}

/// Resolve several samples, failing on the first unknown one
pub(crate) async fn require_all(conn: &mut SqliteConnection, ids: &[EntityRef]) -> ApiResult<Vec<SampleRecord>> {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        records.push(require(conn, id).await?);
    }
    Ok(records)
}
