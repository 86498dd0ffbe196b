use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_vocabularies, Vocabulary, VocabularyFetchOptions};
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
pub struct VocabularySearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub description: Option<StringMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchVocabulariesQuery {
    pub criteria: VocabularySearchCriteria,
    pub fetch_options: VocabularyFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchVocabulariesQuery,
) -> ApiResult<SearchResult<Vocabulary>> {
    access_log::record(&session.user_id, "search-vocabularies", &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))]);

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.codes, &row.code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt_value(&criteria.description, row.description.as_deref()))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let vocabularies = to_vocabularies(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(vocabularies, total))
}
