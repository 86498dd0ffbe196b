//! Delete tags command
//!
//! Tags are removed immediately together with their links.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{
        shared::{validation::validate_deletion, TagId},
        tags::resolve,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteTagsCommand {
    pub ids: Option<Vec<TagId>>,
    pub reason: Option<String>,
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &DeleteTagsCommand) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        let Some(tag) = resolve(conn, session, id).await? else {
            continue;
        };
        tag.authorize_change(session)?;

        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
        tracing::debug!(tag = %tag.perm_id(), "Deleted tag");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteTagsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-tags",
        &[
            ("TAG_IDS", command.ids.log_repr()),
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
        shared::test_helpers::{TestContext, INSTANCE_OBSERVER},
        tags::commands::create::{self, CreateTagsCommand, TagCreation},
    };

    async fn create_tag(ctx: &TestContext, code: &str) {
        let admin = ctx.admin().await;
        create::handle(&ctx.pool, &admin, CreateTagsCommand { creations: vec![TagCreation::new(code)] })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_and_unknown_ids() {
        let ctx = TestContext::new().await;
        create_tag(&ctx, "GONE").await;
        let admin = ctx.admin().await;

        let command = DeleteTagsCommand {
            ids: Some(vec![TagId::Code("gone".into()), TagId::PermId("/admin/NEVER".into())]),
            reason: Some("cleanup".into()),
        };
        handle(&ctx.pool, &admin, command).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM tags").await, 0);
    }

    #[tokio::test]
    async fn test_empty_list_and_missing_reason() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = DeleteTagsCommand {
            ids: Some(vec![]),
            reason: Some("nothing".into()),
        };
        handle(&ctx.pool, &admin, command).await.unwrap();

        let command = DeleteTagsCommand {
            ids: Some(vec![]),
            reason: None,
        };
        let err = handle(&ctx.pool, &admin, command).await.unwrap_err();
        assert_eq!(err.to_string(), "Deletion reason cannot be null");
    }

    #[tokio::test]
    async fn test_foreign_tags_rejected() {
        let ctx = TestContext::new().await;
        create_tag(&ctx, "KEEP").await;
        let observer = ctx.session(INSTANCE_OBSERVER).await;
        let command = DeleteTagsCommand {
            ids: Some(vec![TagId::PermId("/admin/KEEP".into())]),
            reason: Some("mine now".into()),
        };
        let err = handle(&ctx.pool, &observer, command).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with TagPermId = [/admin/KEEP]");
        assert_eq!(ctx.count("SELECT COUNT(*) FROM tags").await, 1);
    }
}
