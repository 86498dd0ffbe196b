//! Controlled vocabularies and their terms
//!
//! A vocabulary lists the values allowed for properties of data type
//! `CONTROLLEDVOCABULARY`. Terms are addressed by `{vocabulary_code, code}`.

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::{ApiError, ApiResult},
    features::shared::ids::VocabularyTermId,
};

pub use commands::{
    CreateVocabulariesCommand, CreateVocabularyTermsCommand, DeleteVocabulariesCommand,
    DeleteVocabularyTermsCommand, TermReplacement, UpdateVocabulariesCommand,
    UpdateVocabularyTermsCommand, VocabularyCreation, VocabularyTermCreation, VocabularyTermUpdate,
    VocabularyUpdate,
};
pub use queries::{
    GetVocabulariesQuery, GetVocabularyTermsQuery, SearchVocabulariesQuery, SearchVocabularyTermsQuery,
    Vocabulary, VocabularyFetchOptions, VocabularySearchCriteria, VocabularyTerm, VocabularyTermFetchOptions,
    VocabularyTermSearchCriteria,
};
pub use routes::{vocabularies_routes, vocabulary_terms_routes};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct VocabularyRecord {
    pub id: i64,
    pub code: String,
    pub managed_internally: bool,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TermRecord {
    pub id: i64,
    pub vocabulary_id: i64,
    pub vocabulary_code: String,
    pub code: String,
    pub ordinal: i64,
    pub official: bool,
}

impl TermRecord {
    pub fn term_id(&self) -> VocabularyTermId {
        VocabularyTermId::new(&self.vocabulary_code, &self.code)
    }

    pub fn matches(&self, id: &VocabularyTermId) -> bool {
        self.vocabulary_code.eq_ignore_ascii_case(id.vocabulary_code.trim())
            && self.code.eq_ignore_ascii_case(id.code.trim())
    }
}

pub(crate) async fn resolve(conn: &mut SqliteConnection, code: &str) -> ApiResult<Option<VocabularyRecord>> {
    let record = sqlx::query_as::<_, VocabularyRecord>(
        "SELECT id, code, managed_internally FROM vocabularies WHERE code = ?",
    )
    .bind(code.trim().to_uppercase())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub(crate) async fn require(conn: &mut SqliteConnection, code: &str) -> ApiResult<VocabularyRecord> {
    resolve(conn, code)
        .await?
        .ok_or_else(|| ApiError::not_found("VocabularyPermId", code.trim().to_uppercase()))
}

pub(crate) async fn resolve_term(
    conn: &mut SqliteConnection,
    id: &VocabularyTermId,
) -> ApiResult<Option<TermRecord>> {
    let record = sqlx::query_as::<_, TermRecord>(
        r#"
        SELECT t.id, t.vocabulary_id, v.code AS vocabulary_code, t.code, t.ordinal, t.official
        FROM vocabulary_terms t
        JOIN vocabularies v ON v.id = t.vocabulary_id
        WHERE v.code = ? AND t.code = ?
        "#,
    )
    .bind(id.vocabulary_code.trim().to_uppercase())
    .bind(id.code.trim().to_uppercase())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub(crate) async fn require_term(conn: &mut SqliteConnection, id: &VocabularyTermId) -> ApiResult<TermRecord> {
    resolve_term(conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("VocabularyTermPermId", id))
}
