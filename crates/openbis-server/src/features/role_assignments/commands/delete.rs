//! Delete role assignments command

use openbis_common::types::{Role, RoleLevel};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        role_assignments::{self, require_admin_on},
        shared::validation::validate_deletion,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRoleAssignmentsCommand {
    pub ids: Option<Vec<i64>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteRoleAssignmentsCommand,
) -> ApiResult<()> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;
    for id in ids {
        let Some(assignment) = role_assignments::resolve(conn, *id).await? else {
            continue;
        };
        let project = assignment.project_id.zip(assignment.project_space_id);
        require_admin_on(session, assignment.space_id, project, id)?;

        if assignment.person_id == Some(session.person_id)
            && assignment.level() == RoleLevel::Instance
            && assignment.role == Role::Admin.as_str()
        {
            return Err(ApiError::user("Instance admins cannot revoke their own instance admin role"));
        }

        sqlx::query("DELETE FROM role_assignments WHERE id = ?")
            .bind(assignment.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(
            id,
            role = %assignment.role,
            space = ?assignment.space_code,
            reason,
            "Role assignment deleted"
        );
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteRoleAssignmentsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-role-assignments",
        &[
            ("ROLE_ASSIGNMENT_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, SPACE_POWER_USER, SPACE_USER};

    async fn assignment_of(ctx: &TestContext, user: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT r.id FROM role_assignments r JOIN persons p ON p.id = r.person_id WHERE p.user_id = ?",
        )
        .bind(user)
        .fetch_one(&ctx.pool)
        .await
        .unwrap()
    }

    fn command(ids: Vec<i64>) -> DeleteRoleAssignmentsCommand {
        DeleteRoleAssignmentsCommand {
            ids: Some(ids),
            reason: Some("revoked".into()),
        }
    }

    #[tokio::test]
    async fn test_revoked_role_is_gone() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let id = assignment_of(&ctx, SPACE_USER).await;
        handle(&ctx.pool, &admin, command(vec![id, 9999])).await.unwrap();
        assert!(ctx.session(SPACE_USER).await.roles.is_empty());
    }

    #[tokio::test]
    async fn test_own_instance_admin_role_kept() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let id = assignment_of(&ctx, "admin").await;
        let err = handle(&ctx.pool, &admin, command(vec![id])).await.unwrap_err();
        assert_eq!(err.to_string(), "Instance admins cannot revoke their own instance admin role");
    }

    #[tokio::test]
    async fn test_power_user_cannot_revoke() {
        let ctx = TestContext::new().await;
        let session = ctx.session(SPACE_POWER_USER).await;
        let id = assignment_of(&ctx, SPACE_USER).await;
        let err = handle(&ctx.pool, &session, command(vec![id])).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Access denied to object with RoleAssignmentTechId = [{}]", id));
    }
}
