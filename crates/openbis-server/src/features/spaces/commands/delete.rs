//! Delete spaces command
//!
//! Spaces are deleted immediately. A space that still holds projects or
//! samples (trashed ones included) is rejected as being used.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::shared::validation::validate_deletion,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSpacesCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteSpacesCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        let code = id.trim().to_uppercase();
        require_instance_admin_for(session, "SpacePermId", &code)?;

        let space_id: Option<i64> = sqlx::query_scalar("SELECT id FROM spaces WHERE code = ?")
            .bind(&code)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(space_id) = space_id else {
            continue;
        };

        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM projects WHERE space_id = ?1)
                 + (SELECT COUNT(*) FROM samples WHERE space_id = ?1)
            "#,
        )
        .bind(space_id)
        .fetch_one(&mut *conn)
        .await?;
        if used > 0 {
            return Err(ApiError::being_used(format!("Space '{}'", code)));
        }

        sqlx::query("DELETE FROM spaces WHERE id = ?")
            .bind(space_id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(space = %code, "Space deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteSpacesCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-spaces",
        &[
            ("SPACE_IDS", command.ids.log_repr()),
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
    use crate::features::{
        shared::test_helpers::{TestContext, GROUP_ADMIN},
        spaces::{
            commands::create::{self, CreateSpacesCommand, SpaceCreation},
            queries::get::{self, GetSpacesQuery},
        },
    };

    fn command(ids: &[&str]) -> DeleteSpacesCommand {
        DeleteSpacesCommand {
            ids: Some(ids.iter().map(|s| s.to_string()).collect()),
            reason: Some("cleanup".into()),
        }
    }

    fn get_query(code: &str) -> GetSpacesQuery {
        GetSpacesQuery {
            ids: vec![code.into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_delete() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = CreateSpacesCommand {
            creations: vec![SpaceCreation {
                code: "SPACE_TO_DELETE".into(),
                description: None,
            }],
        };
        create::handle(&ctx.pool, &admin, creation).await.unwrap();
        let before = get::handle(&ctx.pool, &admin, get_query("SPACE_TO_DELETE")).await.unwrap();
        assert_eq!(before.len(), 1);

        handle(&ctx.pool, &admin, command(&["SPACE_TO_DELETE"])).await.unwrap();
        let after = get::handle(&ctx.pool, &admin, get_query("SPACE_TO_DELETE")).await.unwrap();
        assert_eq!(after.len(), 0);
    }

    #[tokio::test]
    async fn test_space_with_projects_is_being_used() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle(&ctx.pool, &admin, command(&["CISD"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Space 'CISD' is being used");
    }

    #[tokio::test]
    async fn test_empty_and_unknown_ids_are_noops() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, command(&[])).await.unwrap();
        handle(&ctx.pool, &admin, command(&["NOPE"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_reason_and_ids_are_required() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle(
            &ctx.pool,
            &admin,
            DeleteSpacesCommand {
                ids: Some(vec![]),
                reason: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Deletion reason cannot be null");
    }

    #[tokio::test]
    async fn test_group_admin_is_rejected_naming_the_space() {
        let ctx = TestContext::new().await;
        let session = ctx.session(GROUP_ADMIN).await;
        let err = handle(&ctx.pool, &session, command(&["TESTGROUP"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with SpacePermId = [TESTGROUP]");
    }
}
