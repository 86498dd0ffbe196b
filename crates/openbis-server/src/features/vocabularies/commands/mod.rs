pub mod create;
pub mod create_terms;
pub mod delete;
pub mod delete_terms;
pub mod update;
pub mod update_terms;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::VocabularyRecord;
use crate::{
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::shared::{
        error_helpers::map_unique_violation,
        ids::VocabularyTermId,
        validation::{blank_to_none, validate_code},
    },
};

pub use create::{CreateVocabulariesCommand, VocabularyCreation};
pub use create_terms::CreateVocabularyTermsCommand;
pub use delete::DeleteVocabulariesCommand;
pub use delete_terms::{DeleteVocabularyTermsCommand, TermReplacement};
pub use update::{UpdateVocabulariesCommand, VocabularyUpdate};
pub use update_terms::{UpdateVocabularyTermsCommand, VocabularyTermUpdate};

fn default_true() -> bool {
    true
}

/// A new term, either listed inside a vocabulary creation or on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTermCreation {
    /// Owning vocabulary; ignored inside a vocabulary creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_id: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub official: bool,
    /// Code of the term to insert after; appended when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_term_id: Option<String>,
}

impl VocabularyTermCreation {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            vocabulary_id: None,
            code: code.into(),
            label: None,
            description: None,
            official: true,
            previous_term_id: None,
        }
    }
}

impl LogRepr for VocabularyTermCreation {
    fn log_repr(&self) -> String {
        match &self.vocabulary_id {
            Some(vocabulary) => format!("VocabularyTermCreation[vocabularyId={},code={}]", vocabulary, self.code),
            None => format!("VocabularyTermCreation[code={}]", self.code),
        }
    }
}

/// Ordinal a term placed right after `previous` gets; later terms move down
async fn ordinal_after(
    conn: &mut SqliteConnection,
    vocabulary: &VocabularyRecord,
    previous: Option<&str>,
) -> ApiResult<i64> {
    let Some(previous) = previous else {
        let last: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(ordinal), 0) FROM vocabulary_terms WHERE vocabulary_id = ?",
        )
        .bind(vocabulary.id)
        .fetch_one(&mut *conn)
        .await?;
        return Ok(last + 1);
    };

    let previous_id = VocabularyTermId::new(&vocabulary.code, previous.trim().to_uppercase());
    let previous_ordinal: Option<i64> =
        sqlx::query_scalar("SELECT ordinal FROM vocabulary_terms WHERE vocabulary_id = ? AND code = ?")
            .bind(vocabulary.id)
            .bind(&previous_id.code)
            .fetch_optional(&mut *conn)
            .await?;
    let previous_ordinal =
        previous_ordinal.ok_or_else(|| ApiError::not_found("VocabularyTermPermId", &previous_id))?;

    sqlx::query("UPDATE vocabulary_terms SET ordinal = ordinal + 1 WHERE vocabulary_id = ? AND ordinal > ?")
        .bind(vocabulary.id)
        .bind(previous_ordinal)
        .execute(&mut *conn)
        .await?;
    Ok(previous_ordinal + 1)
}

/// Insert one term into `vocabulary`, returning its id
pub(crate) async fn insert_term(
    conn: &mut SqliteConnection,
    session: &Session,
    vocabulary: &VocabularyRecord,
    term: &VocabularyTermCreation,
) -> ApiResult<VocabularyTermId> {
    let code = validate_code(&term.code, "Vocabulary term")?;
    let id = VocabularyTermId::new(&vocabulary.code, &code);
    let ordinal = ordinal_after(conn, vocabulary, term.previous_term_id.as_deref()).await?;

    sqlx::query(
        r#"
        INSERT INTO vocabulary_terms
            (vocabulary_id, code, label, description, ordinal, official, registrator_id, registration_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(vocabulary.id)
    .bind(&code)
    .bind(blank_to_none(term.label.clone()))
    .bind(blank_to_none(term.description.clone()))
    .bind(ordinal)
    .bind(term.official)
    .bind(session.person_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, || format!("Vocabulary term '{}' already exists", id)))?;
    Ok(id)
}
