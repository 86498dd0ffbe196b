use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_all, SemanticAnnotation, SemanticAnnotationFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{criteria::matches_opt_value, Paging, SearchResult, StringMatch},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticAnnotationSearchCriteria {
    pub entity_type_code: Option<StringMatch>,
    pub property_type_code: Option<StringMatch>,
    pub predicate_accession_id: Option<StringMatch>,
    pub descriptor_accession_id: Option<StringMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSemanticAnnotationsQuery {
    pub criteria: SemanticAnnotationSearchCriteria,
    pub fetch_options: SemanticAnnotationFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchSemanticAnnotationsQuery,
) -> ApiResult<SearchResult<SemanticAnnotation>> {
    access_log::record(
        &session.user_id,
        "search-semantic-annotations",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_all(&mut conn)
        .await?
        .into_iter()
        .filter(|a| {
            matches_opt_value(
                &criteria.entity_type_code,
                a.entity_type.as_ref().map(|t| t.code.as_str()),
            )
        })
        .filter(|a| matches_opt_value(&criteria.property_type_code, a.property_type.as_deref()))
        .filter(|a| {
            matches_opt_value(
                &criteria.predicate_accession_id,
                a.predicate.accession_id.as_deref(),
            )
        })
        .filter(|a| {
            matches_opt_value(
                &criteria.descriptor_accession_id,
                a.descriptor.accession_id.as_deref(),
            )
        })
        .collect();

    let (window, total) = query.paging.apply(matching);
    Ok(SearchResult::new(window, total))
}
