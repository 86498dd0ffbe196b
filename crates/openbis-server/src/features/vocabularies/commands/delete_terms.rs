//! Delete vocabulary terms command
//!
//! A term used as a property value can only be deleted when a replacement
//! from the same vocabulary is named for it; the values are rewritten to the
//! replacement and the affected entities re-indexed.

use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{
        shared::{ids::VocabularyTermId, validation::validate_deletion},
        vocabularies::{self, TermRecord},
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermReplacement {
    pub replaced: VocabularyTermId,
    pub replacement: VocabularyTermId,
}

impl LogRepr for TermReplacement {
    fn log_repr(&self) -> String {
        format!("{} -> {}", self.replaced, self.replacement)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVocabularyTermsCommand {
    pub ids: Option<Vec<VocabularyTermId>>,
    pub reason: Option<String>,
    #[serde(default)]
    pub replacements: Vec<TermReplacement>,
}

/// Entities holding `term` as a property value, per kind
async fn usages(conn: &mut SqliteConnection, term_id: i64) -> ApiResult<Vec<(EntityKind, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT entity_kind, entity_id FROM entity_properties WHERE vocabulary_term_id = ? ORDER BY entity_kind, entity_id",
    )
    .bind(term_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter()
        .map(|(kind, id)| Ok((kind.parse()?, id)))
        .collect()
}

async fn replace_values(
    conn: &mut SqliteConnection,
    replaced: &TermRecord,
    replacement: &TermRecord,
    used_by: &[(EntityKind, i64)],
) -> ApiResult<()> {
    sqlx::query("UPDATE entity_properties SET value = ?, vocabulary_term_id = ? WHERE vocabulary_term_id = ?")
        .bind(&replacement.code)
        .bind(replacement.id)
        .bind(replaced.id)
        .execute(&mut *conn)
        .await?;

    for kind in EntityKind::ALL {
        let ids: Vec<i64> = used_by.iter().filter(|(k, _)| k == kind).map(|(_, id)| *id).collect();
        outbox::record_rows(conn, *kind, &ids, IndexAction::Upsert).await?;
    }
    tracing::info!(
        replaced = %replaced.term_id(),
        replacement = %replacement.term_id(),
        values = used_by.len(),
        "Vocabulary term values replaced"
    );
    Ok(())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteVocabularyTermsCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    let mut terms = Vec::with_capacity(ids.len());
    for id in ids {
        require_instance_admin_for(session, "VocabularyTermPermId", id)?;
        if let Some(term) = vocabularies::resolve_term(conn, id).await? {
            terms.push(term);
        }
    }
    let deleted: Vec<i64> = terms.iter().map(|t| t.id).collect();

    for term in &terms {
        let term_id = term.term_id();
        let used_by = usages(conn, term.id).await?;
        if !used_by.is_empty() {
            let replacement = command
                .replacements
                .iter()
                .find(|r| term.matches(&r.replaced))
                .ok_or_else(|| ApiError::being_used(format!("Vocabulary term '{}'", term_id)))?;
            let replacement = vocabularies::require_term(conn, &replacement.replacement).await?;

            if replacement.vocabulary_id != term.vocabulary_id {
                return Err(ApiError::user(format!(
                    "Vocabulary term '{}' cannot be replaced by '{}' from another vocabulary",
                    term_id,
                    replacement.term_id()
                )));
            }
            if deleted.contains(&replacement.id) {
                return Err(ApiError::user(format!(
                    "Vocabulary term '{}' cannot be replaced by '{}' which is deleted as well",
                    term_id,
                    replacement.term_id()
                )));
            }
            replace_values(conn, term, &replacement, &used_by).await?;
        }

        sqlx::query("DELETE FROM vocabulary_terms WHERE id = ?")
            .bind(term.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteVocabularyTermsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-vocabulary-terms",
        &[
            ("VOCABULARY_TERM_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
            ("REPLACEMENTS", command.replacements.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
