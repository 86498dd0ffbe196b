pub mod get;
pub mod get_terms;
pub mod search;
pub mod search_terms;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::{
    db::push_in,
    error::ApiResult,
    features::shared::{fetch::Fetched, ids::VocabularyTermId},
};

pub use get::GetVocabulariesQuery;
pub use get_terms::GetVocabularyTermsQuery;
pub use search::{SearchVocabulariesQuery, VocabularySearchCriteria};
pub use search_terms::{SearchVocabularyTermsQuery, VocabularyTermSearchCriteria};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyTermFetchOptions {
    pub registrator: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyFetchOptions {
    pub registrator: bool,
    /// Terms, sorted by code
    pub terms: Option<VocabularyTermFetchOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyTerm {
    pub perm_id: VocabularyTermId,
    pub code: String,
    pub vocabulary_code: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub ordinal: i64,
    pub official: bool,
    pub registration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    pub perm_id: String,
    pub code: String,
    pub description: Option<String>,
    pub managed_internally: bool,
    pub internal_name_space: bool,
    pub chosen_from_list: bool,
    pub url_template: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub terms: Fetched<Vec<VocabularyTerm>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct VocabularyRow {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub managed_internally: bool,
    pub internal_name_space: bool,
    pub chosen_from_list: bool,
    pub url_template: Option<String>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TermRow {
    pub vocabulary_id: i64,
    pub vocabulary_code: String,
    pub code: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub ordinal: i64,
    pub official: bool,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
}

impl TermRow {
    pub fn into_term(self, fetch: &VocabularyTermFetchOptions) -> VocabularyTerm {
        VocabularyTerm {
            perm_id: VocabularyTermId::new(&self.vocabulary_code, &self.code),
            registrator: Fetched::when(fetch.registrator, || self.registrator.clone()),
            code: self.code,
            vocabulary_code: self.vocabulary_code,
            label: self.label,
            description: self.description,
            ordinal: self.ordinal,
            official: self.official,
            registration_date: self.registration_date,
        }
    }
}

const TERM_SELECT: &str = r#"
    SELECT t.vocabulary_id, v.code AS vocabulary_code, t.code, t.label, t.description, t.ordinal,
           t.official, p.user_id AS registrator, t.registration_date
    FROM vocabulary_terms t
    JOIN vocabularies v ON v.id = t.vocabulary_id
    LEFT JOIN persons p ON p.id = t.registrator_id
"#;

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<VocabularyRow>> {
    let rows = sqlx::query_as::<_, VocabularyRow>(
        r#"
        SELECT v.id, v.code, v.description, v.managed_internally, v.internal_name_space,
               v.chosen_from_list, v.url_template, p.user_id AS registrator,
               v.registration_date, v.modification_date
        FROM vocabularies v
        LEFT JOIN persons p ON p.id = v.registrator_id
        ORDER BY v.code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Every term, ordered by vocabulary and term code
pub(crate) async fn load_term_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<TermRow>> {
    let sql = format!("{} ORDER BY v.code, t.code", TERM_SELECT);
    let rows = sqlx::query_as::<_, TermRow>(&sql).fetch_all(&mut *conn).await?;
    Ok(rows)
}

async fn terms_of(conn: &mut SqliteConnection, vocabulary_ids: &[i64]) -> ApiResult<Vec<TermRow>> {
    if vocabulary_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(TERM_SELECT);
    builder.push(" WHERE ");
    push_in(&mut builder, "t.vocabulary_id", vocabulary_ids);
    builder.push(" ORDER BY t.code");
    let rows = builder.build_query_as::<TermRow>().fetch_all(&mut *conn).await?;
    Ok(rows)
}

pub(crate) async fn to_vocabularies(
    conn: &mut SqliteConnection,
    rows: Vec<VocabularyRow>,
    fetch: &VocabularyFetchOptions,
) -> ApiResult<Vec<Vocabulary>> {
    let mut terms: HashMap<i64, Vec<VocabularyTerm>> = HashMap::new();
    if let Some(term_fetch) = &fetch.terms {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        for row in terms_of(conn, &ids).await? {
            terms
                .entry(row.vocabulary_id)
                .or_default()
                .push(row.into_term(term_fetch));
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| Vocabulary {
            perm_id: row.code.clone(),
            terms: Fetched::when(fetch.terms.is_some(), || terms.remove(&row.id).unwrap_or_default()),
            registrator: Fetched::when(fetch.registrator, || row.registrator.clone()),
            code: row.code,
            description: row.description,
            managed_internally: row.managed_internally,
            internal_name_space: row.internal_name_space,
            chosen_from_list: row.chosen_from_list,
            url_template: row.url_template,
            registration_date: row.registration_date,
            modification_date: row.modification_date,
        })
        .collect())
}
