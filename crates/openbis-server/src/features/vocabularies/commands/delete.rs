//! Delete vocabularies command
//!
//! Terms go along with their vocabulary. A vocabulary referenced by a
//! property type is being used.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{shared::validation::validate_deletion, vocabularies},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVocabulariesCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteVocabulariesCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        require_instance_admin_for(session, "VocabularyPermId", id.trim().to_uppercase())?;
        let Some(vocabulary) = vocabularies::resolve(conn, id).await? else {
            continue;
        };

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM property_types WHERE vocabulary_id = ?")
            .bind(vocabulary.id)
            .fetch_one(&mut *conn)
            .await?;
        if users > 0 {
            return Err(ApiError::being_used(format!("Vocabulary '{}'", vocabulary.code)));
        }

        sqlx::query("DELETE FROM vocabularies WHERE id = ?")
            .bind(vocabulary.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(code = %vocabulary.code, "Vocabulary deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteVocabulariesCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-vocabularies",
        &[
            ("VOCABULARY_IDS", command.ids.log_repr()),
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
        shared::test_helpers::TestContext,
        vocabularies::commands::{create, CreateVocabulariesCommand, VocabularyCreation, VocabularyTermCreation},
    };

    fn command(ids: &[&str]) -> DeleteVocabulariesCommand {
        DeleteVocabulariesCommand {
            ids: Some(ids.iter().map(|s| s.to_string()).collect()),
            reason: Some("cleanup".into()),
        }
    }

    #[tokio::test]
    async fn test_delete_takes_terms_along() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut creation = VocabularyCreation::new("COLORS");
        creation.terms = vec![VocabularyTermCreation::new("RED")];
        create::handle(&ctx.pool, &admin, CreateVocabulariesCommand { creations: vec![creation] })
            .await
            .unwrap();

        handle(&ctx.pool, &admin, command(&["colors", "UNKNOWN"])).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM vocabularies WHERE code = 'COLORS'").await, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM vocabulary_terms WHERE code = 'RED'").await, 0);
    }

    #[tokio::test]
    async fn test_vocabulary_of_property_type_is_being_used() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle(&ctx.pool, &admin, command(&["ORGANISM"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Vocabulary 'ORGANISM' is being used");
    }

    #[tokio::test]
    async fn test_empty_list_is_noop() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, command(&[])).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM vocabularies").await, 1);
    }
}
