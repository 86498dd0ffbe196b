//! Delete projects command
//!
//! Projects are deleted immediately; one that still holds experiments or
//! samples (trashed ones included) is being used.

use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        projects::resolve,
        shared::{validation::validate_deletion, EntityRef},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteProjectsCommand {
    pub ids: Option<Vec<EntityRef>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteProjectsCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        let Some(project) = resolve(conn, id).await? else {
            continue;
        };
        let identifier = project.identifier();
        if !session.has_space_role(project.space_id, Role::PowerUser) {
            return Err(ApiError::unauthorized("ProjectIdentifier", &identifier));
        }

        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM experiments WHERE project_id = ?1)
                 + (SELECT COUNT(*) FROM samples WHERE project_id = ?1)
            "#,
        )
        .bind(project.id)
        .fetch_one(&mut *conn)
        .await?;
        if used > 0 {
            return Err(ApiError::being_used(format!("Project '{}'", identifier)));
        }

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(project = %identifier, "Project deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteProjectsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-projects",
        &[
            ("PROJECT_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
