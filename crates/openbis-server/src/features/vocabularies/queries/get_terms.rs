use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_term_rows, VocabularyTerm, VocabularyTermFetchOptions};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::shared::ids::VocabularyTermId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetVocabularyTermsQuery {
    pub ids: Vec<VocabularyTermId>,
    #[serde(default)]
    pub fetch_options: VocabularyTermFetchOptions,
}

/// Terms keyed by `CODE (VOCABULARY)`
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetVocabularyTermsQuery,
) -> ApiResult<BTreeMap<String, VocabularyTerm>> {
    access_log::record(&session.user_id, "get-vocabulary-terms", &[("VOCABULARY_TERM_IDS", query.ids.log_repr())]);

    let mut conn = pool.acquire().await?;
    Ok(load_term_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| {
            query.ids.iter().any(|id| {
                id.vocabulary_code.trim().eq_ignore_ascii_case(&row.vocabulary_code)
                    && id.code.trim().eq_ignore_ascii_case(&row.code)
            })
        })
        .map(|row| row.into_term(&query.fetch_options))
        .map(|term| (term.perm_id.to_string(), term))
        .collect())
}
