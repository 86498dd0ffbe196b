//! Projects: groups of experiments inside a space

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::ApiResult,
    features::shared::{
        identifiers::{project_identifier, split_identifier},
        EntityRef,
    },
};

pub use commands::{CreateProjectsCommand, DeleteProjectsCommand, ProjectCreation, ProjectUpdate, UpdateProjectsCommand};
pub use queries::{GetProjectsQuery, Project, ProjectFetchOptions, ProjectSearchCriteria, SearchProjectsQuery};
pub use routes::projects_routes;

/// A resolved project reference
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRecord {
    pub id: i64,
    pub perm_id: String,
    pub code: String,
    pub space_id: i64,
    pub space_code: String,
}

impl ProjectRecord {
    pub fn identifier(&self) -> String {
        project_identifier(&self.space_code, &self.code)
    }
}

const RESOLVE_SQL: &str = r#"
    SELECT p.id, p.perm_id, p.code, p.space_id, s.code AS space_code
    FROM projects p JOIN spaces s ON s.id = p.space_id
"#;

/// Look a project up by perm id or `/SPACE/CODE`
pub async fn resolve(conn: &mut SqliteConnection, id: &EntityRef) -> ApiResult<Option<ProjectRecord>> {
    let record = match id {
        EntityRef::PermId(perm_id) => {
            sqlx::query_as::<_, ProjectRecord>(&format!("{} WHERE p.perm_id = ?", RESOLVE_SQL))
                .bind(perm_id.trim())
                .fetch_optional(&mut *conn)
                .await?
        },
        EntityRef::Identifier(identifier) => {
            let Ok(parts) = split_identifier(identifier, &[2]) else {
                return Ok(None);
            };
            sqlx::query_as::<_, ProjectRecord>(&format!(
                "{} WHERE s.code = ? AND p.code = ?",
                RESOLVE_SQL
            ))
            .bind(&parts[0])
            .bind(&parts[1])
            .fetch_optional(&mut *conn)
            .await?
        },
    };
    Ok(record)
}

/// Like [`resolve`], failing with an object-not-found error
pub async fn require(conn: &mut SqliteConnection, id: &EntityRef) -> ApiResult<ProjectRecord> {
    let kind = match id {
        EntityRef::PermId(_) => "ProjectPermId",
        EntityRef::Identifier(_) => "ProjectIdentifier",
    };
    resolve(conn, id)
        .await?
        .ok_or_else(|| crate::error::ApiError::not_found(kind, id))
}
