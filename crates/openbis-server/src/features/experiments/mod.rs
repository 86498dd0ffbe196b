//! Experiments: typed entities owned by a project
//!
//! Identifiers have the form `/SPACE/PROJECT/CODE`. Trashed experiments are
//! invisible here; they come back only through a deletion revert.

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::{ApiError, ApiResult},
    features::shared::{
        identifiers::{experiment_identifier, split_identifier},
        EntityRef,
    },
};

pub use commands::{
    CreateExperimentsCommand, DeleteExperimentsCommand, ExperimentCreation, ExperimentUpdate,
    UpdateExperimentsCommand,
};
pub use queries::{
    Experiment, ExperimentFetchOptions, ExperimentSearchCriteria, GetExperimentsQuery, SearchExperimentsQuery,
};
pub use routes::experiments_routes;

#[derive(Debug, Clone, FromRow)]
pub struct ExperimentRecord {
    pub id: i64,
    pub perm_id: String,
    pub code: String,
    pub type_id: i64,
    pub type_code: String,
    pub project_id: i64,
    pub project_code: String,
    pub space_id: i64,
    pub space_code: String,
}

impl ExperimentRecord {
    pub fn identifier(&self) -> String {
        experiment_identifier(&self.space_code, &self.project_code, &self.code)
    }
}

const RESOLVE_SQL: &str = r#"
    SELECT e.id, e.perm_id, e.code, e.type_id, t.code AS type_code, e.project_id,
           p.code AS project_code, p.space_id, s.code AS space_code
    FROM experiments e
    JOIN entity_types t ON t.id = e.type_id
    JOIN projects p ON p.id = e.project_id
    JOIN spaces s ON s.id = p.space_id
"#;

/// Look a live experiment up by perm id or `/SPACE/PROJECT/CODE`
pub async fn resolve(conn: &mut SqliteConnection, id: &EntityRef) -> ApiResult<Option<ExperimentRecord>> {
    let record = match id {
        EntityRef::PermId(perm_id) => {
            sqlx::query_as::<_, ExperimentRecord>(&format!(
                "{} WHERE e.perm_id = ? AND e.deletion_id IS NULL",
                RESOLVE_SQL
            ))
            .bind(perm_id.trim())
            .fetch_optional(&mut *conn)
            .await?
        },
        EntityRef::Identifier(identifier) => {
            let Ok(parts) = split_identifier(identifier, &[3]) else {
                return Ok(None);
            };
            sqlx::query_as::<_, ExperimentRecord>(&format!(
                "{} WHERE s.code = ? AND p.code = ? AND e.code = ? AND e.deletion_id IS NULL",
                RESOLVE_SQL
            ))
            .bind(&parts[0])
            .bind(&parts[1])
            .bind(&parts[2])
            .fetch_optional(&mut *conn)
            .await?
        },
    };
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, id: &EntityRef) -> ApiResult<ExperimentRecord> {
    let kind = match id {
        EntityRef::PermId(_) => "ExperimentPermId",
        EntityRef::Identifier(_) => "ExperimentIdentifier",
    };
    resolve(conn, id).await?.ok_or_else(|| ApiError::not_found(kind, id))
}
