//! Create vocabulary terms command
//!
//! Official terms are added by instance admins. Any user may suggest an
//! unofficial term, except in vocabularies managed internally.

use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{insert_term, VocabularyTermCreation};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::{
        authorization::{require_instance_admin, require_instance_admin_for},
        Session,
    },
    error::{ApiError, ApiResult},
    features::{shared::ids::VocabularyTermId, vocabularies},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVocabularyTermsCommand {
    pub creations: Vec<VocabularyTermCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateVocabularyTermsCommand,
) -> ApiResult<Vec<VocabularyTermId>> {
    let mut ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let vocabulary_code = creation
            .vocabulary_id
            .as_deref()
            .ok_or_else(|| ApiError::user("Vocabulary id cannot be null"))?;
        let vocabulary = vocabularies::require(conn, vocabulary_code).await?;

        if creation.official {
            require_instance_admin(session, "Creating official vocabulary terms")?;
        } else if vocabulary.managed_internally {
            require_instance_admin_for(session, "VocabularyPermId", &vocabulary.code)?;
        } else if !session.has_any_role(Role::User) {
            return Err(ApiError::AuthorizationFailure(format!(
                "User '{}' cannot add terms to vocabulary '{}'",
                session.user_id, vocabulary.code
            )));
        }

        ids.push(insert_term(conn, session, &vocabulary, creation).await?);
    }
    Ok(ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateVocabularyTermsCommand,
) -> ApiResult<Vec<VocabularyTermId>> {
    access_log::record(
        &session.user_id,
        "create-vocabulary-terms",
        &[("NEW_VOCABULARY_TERMS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(ids)
}
