use chrono::Utc;
use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{
        authorization::{require_project, require_space},
        Session,
    },
    error::{ApiError, ApiResult},
    features::{
        projects::require,
        shared::{error_helpers::map_unique_violation, validation::blank_to_none, EntityRef},
    },
    index::{outbox, IndexAction},
};
use openbis_common::types::EntityKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub project_id: EntityRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Move the project to another space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectsCommand {
    pub updates: Vec<ProjectUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateProjectsCommand,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let project = require(conn, &update.project_id).await?;
        let identifier = project.identifier();
        require_project(session, project.id, project.space_id, &identifier, Role::PowerUser)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE projects SET description = ?, modification_date = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(now)
                .bind(project.id)
                .execute(&mut *conn)
                .await?;
        }

        if let Some(space) = &update.space_id {
            let space_code = space.trim().to_uppercase();
            let space_id: Option<i64> = sqlx::query_scalar("SELECT id FROM spaces WHERE code = ?")
                .bind(&space_code)
                .fetch_optional(&mut *conn)
                .await?;
            let space_id = space_id.ok_or_else(|| ApiError::not_found("SpacePermId", &space_code))?;
            if space_id == project.space_id {
                continue;
            }
            require_space(session, space_id, &space_code, Role::PowerUser)?;

            sqlx::query("UPDATE projects SET space_id = ?, modification_date = ? WHERE id = ?")
                .bind(space_id)
                .bind(now)
                .bind(project.id)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    map_unique_violation(e, || {
                        format!("Project '/{}/{}' already exists", space_code, project.code)
                    })
                })?;
            // project samples follow their project
            sqlx::query("UPDATE samples SET space_id = ? WHERE project_id = ?")
                .bind(space_id)
                .bind(project.id)
                .execute(&mut *conn)
                .await?;

            let experiments: Vec<String> =
                sqlx::query_scalar("SELECT perm_id FROM experiments WHERE project_id = ? AND deletion_id IS NULL")
                    .bind(project.id)
                    .fetch_all(&mut *conn)
                    .await?;
            outbox::record_all(conn, EntityKind::Experiment, &experiments, IndexAction::Upsert).await?;
            let samples: Vec<String> =
                sqlx::query_scalar("SELECT perm_id FROM samples WHERE project_id = ? AND deletion_id IS NULL")
                    .bind(project.id)
                    .fetch_all(&mut *conn)
                    .await?;
            outbox::record_all(conn, EntityKind::Sample, &samples, IndexAction::Upsert).await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateProjectsCommand) -> ApiResult<()> {
    let ids: Vec<EntityRef> = command.updates.iter().map(|u| u.project_id.clone()).collect();
    access_log::record(&session.user_id, "update-projects", &[("PROJECT_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::TestContext;

    #[tokio::test]
    async fn test_move_project_to_other_space() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = UpdateProjectsCommand {
            updates: vec![ProjectUpdate {
                project_id: EntityRef::identifier("/CISD/NEMO"),
                description: Some("moved".into()),
                space_id: Some("TESTGROUP".into()),
            }],
        };
        handle(&ctx.pool, &admin, command).await.unwrap();

        let mut conn = ctx.pool.acquire().await.unwrap();
        let moved = require(&mut conn, &EntityRef::identifier("/TESTGROUP/NEMO")).await.unwrap();
        assert_eq!(moved.space_code, "TESTGROUP");
    }
}
