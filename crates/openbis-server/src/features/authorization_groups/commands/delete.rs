//! Delete authorization groups command
//!
//! Group membership and the roles granted to the group go with it.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::{authorization_groups, shared::validation::validate_deletion},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteAuthorizationGroupsCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteAuthorizationGroupsCommand,
) -> ApiResult<()> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;
    for id in ids {
        require_instance_admin_for(session, "AuthorizationGroupPermId", id.trim().to_uppercase())?;
        let Some(group) = authorization_groups::resolve(conn, id).await? else {
            continue;
        };
        sqlx::query("DELETE FROM authorization_groups WHERE id = ?")
            .bind(group.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(group = %group.code, reason, "Authorization group deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteAuthorizationGroupsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-authorization-groups",
        &[
            ("AUTHORIZATION_GROUP_IDS", command.ids.log_repr()),
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
    use crate::features::shared::test_helpers::{TestContext, GROUP_POWER_USER};

    fn command(ids: &[&str]) -> DeleteAuthorizationGroupsCommand {
        DeleteAuthorizationGroupsCommand {
            ids: Some(ids.iter().map(|s| s.to_string()).collect()),
            reason: Some("reorganized".into()),
        }
    }

    #[tokio::test]
    async fn test_delete_drops_group_roles() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, command(&["GROUP_POWER_USERS", "MISSING"])).await.unwrap();

        assert_eq!(
            ctx.count("SELECT COUNT(*) FROM authorization_groups WHERE code = 'GROUP_POWER_USERS'")
                .await,
            0
        );
        let session = ctx.session(GROUP_POWER_USER).await;
        assert!(session.roles.is_empty());
    }

    #[tokio::test]
    async fn test_empty_ids_is_noop() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, command(&[])).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM authorization_groups").await, 3);
    }

    #[tokio::test]
    async fn test_group_power_user_rejected() {
        let ctx = TestContext::new().await;
        let session = ctx.session(GROUP_POWER_USER).await;
        let err = handle(&ctx.pool, &session, command(&["group_admins"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with AuthorizationGroupPermId = [GROUP_ADMINS]");
    }
}
