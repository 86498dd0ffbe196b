//! Delete semantic annotations command

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::shared::validation::validate_deletion,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSemanticAnnotationsCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteSemanticAnnotationsCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;
    for id in ids {
        require_instance_admin_for(session, "SemanticAnnotationPermId", id.trim())?;
        sqlx::query("DELETE FROM semantic_annotations WHERE perm_id = ?")
            .bind(id.trim())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteSemanticAnnotationsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-semantic-annotations",
        &[
            ("SEMANTIC_ANNOTATION_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
