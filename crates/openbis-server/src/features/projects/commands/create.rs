use chrono::Utc;
use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_space, Session},
    db::next_perm_id,
    error::{ApiError, ApiResult},
    features::shared::{
        error_helpers::map_unique_violation,
        identifiers::project_identifier,
        validation::{blank_to_none, validate_code},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectCreation {
    /// Code of the owning space
    pub space_id: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

crate::struct_log_repr!(ProjectCreation, "ProjectCreation", "spaceId" => space_id, "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectsCommand {
    pub creations: Vec<ProjectCreation>,
}

impl CreateProjectsCommand {
    pub fn validate(&self) -> ApiResult<()> {
        for creation in &self.creations {
            validate_code(&creation.code, "Project")?;
            if creation.space_id.trim().is_empty() {
                return Err(ApiError::user("Space id cannot be null"));
            }
        }
        Ok(())
    }
}

/// Insert the projects, returning their perm ids
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateProjectsCommand,
) -> ApiResult<Vec<String>> {
    command.validate()?;

    let now = Utc::now();
    let mut perm_ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let space_code = creation.space_id.trim().to_uppercase();
        let space_id: Option<i64> = sqlx::query_scalar("SELECT id FROM spaces WHERE code = ?")
            .bind(&space_code)
            .fetch_optional(&mut *conn)
            .await?;
        let space_id = space_id.ok_or_else(|| ApiError::not_found("SpacePermId", &space_code))?;
        require_space(session, space_id, &space_code, Role::PowerUser)?;

        let code = validate_code(&creation.code, "Project")?;
        let perm_id = next_perm_id(conn).await?;
        sqlx::query(
            r#"
            INSERT INTO projects (perm_id, code, space_id, description, registrator_id,
                                  registration_date, modification_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&perm_id)
        .bind(&code)
        .bind(space_id)
        .bind(blank_to_none(creation.description.clone()))
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!("Project '{}' already exists", project_identifier(&space_code, &code))
            })
        })?;
        perm_ids.push(perm_id);
    }
    Ok(perm_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateProjectsCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-projects", &[("NEW_PROJECTS", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let perm_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(perm_ids)
}
