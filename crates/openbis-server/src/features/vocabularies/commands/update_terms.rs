//! Update vocabulary terms command
//!
//! Unofficial terms can be edited by any user and promoted by an instance
//! admin; official terms belong to instance admins and stay official.

use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{
        shared::{ids::VocabularyTermId, validation::blank_to_none},
        vocabularies,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTermUpdate {
    pub term_id: VocabularyTermId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official: Option<bool>,
    /// Move the term right after this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_term_id: Option<String>,
}

impl VocabularyTermUpdate {
    pub fn new(term_id: VocabularyTermId) -> Self {
        Self {
            term_id,
            label: None,
            description: None,
            official: None,
            previous_term_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVocabularyTermsCommand {
    pub updates: Vec<VocabularyTermUpdate>,
}

async fn move_after(
    conn: &mut SqliteConnection,
    term: &vocabularies::TermRecord,
    previous: &str,
) -> ApiResult<()> {
    let previous_id = VocabularyTermId::new(&term.vocabulary_code, previous.trim().to_uppercase());
    if previous_id.code == term.code {
        return Err(ApiError::user(format!("Vocabulary term '{}' cannot follow itself", previous_id)));
    }
    let previous = vocabularies::require_term(conn, &previous_id).await?;

    sqlx::query("UPDATE vocabulary_terms SET ordinal = ordinal + 1 WHERE vocabulary_id = ? AND ordinal > ? AND id <> ?")
        .bind(term.vocabulary_id)
        .bind(previous.ordinal)
        .bind(term.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE vocabulary_terms SET ordinal = ? WHERE id = ?")
        .bind(previous.ordinal + 1)
        .bind(term.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateVocabularyTermsCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let term = vocabularies::require_term(conn, &update.term_id).await?;
        let term_id = term.term_id();

        if term.official || update.official == Some(true) {
            require_instance_admin_for(session, "VocabularyTermPermId", &term_id)?;
        } else if !session.has_any_role(Role::User) {
            return Err(ApiError::unauthorized("VocabularyTermPermId", &term_id));
        }
        if term.official && update.official == Some(false) {
            return Err(ApiError::user(format!(
                "Official vocabulary term '{}' cannot be updated to be unofficial",
                term_id
            )));
        }

        if let Some(label) = &update.label {
            sqlx::query("UPDATE vocabulary_terms SET label = ? WHERE id = ?")
                .bind(blank_to_none(Some(label.clone())))
                .bind(term.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(description) = &update.description {
            sqlx::query("UPDATE vocabulary_terms SET description = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(term.id)
                .execute(&mut *conn)
                .await?;
        }
        if update.official == Some(true) {
            sqlx::query("UPDATE vocabulary_terms SET official = 1 WHERE id = ?")
                .bind(term.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(previous) = &update.previous_term_id {
            move_after(conn, &term, previous).await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateVocabularyTermsCommand) -> ApiResult<()> {
    let ids: Vec<&VocabularyTermId> = command.updates.iter().map(|u| &u.term_id).collect();
    access_log::record(&session.user_id, "update-vocabulary-terms", &[("VOCABULARY_TERM_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
