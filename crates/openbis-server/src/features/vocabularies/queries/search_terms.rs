use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_term_rows, VocabularyTerm, VocabularyTermFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt, matches_opt_value},
        Paging, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyTermSearchCriteria {
    pub vocabulary_codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub label: Option<StringMatch>,
    pub official: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchVocabularyTermsQuery {
    pub criteria: VocabularyTermSearchCriteria,
    pub fetch_options: VocabularyTermFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchVocabularyTermsQuery,
) -> ApiResult<SearchResult<VocabularyTerm>> {
    access_log::record(
        &session.user_id,
        "search-vocabulary-terms",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_term_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.vocabulary_codes, &row.vocabulary_code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt_value(&criteria.label, row.label.as_deref()))
        .filter(|row| criteria.official.map_or(true, |official| row.official == official))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let terms = window
        .into_iter()
        .map(|row| row.into_term(&query.fetch_options))
        .collect();
    Ok(SearchResult::new(terms, total))
}
