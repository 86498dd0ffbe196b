use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_entity_types, EntityType, EntityTypeFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::{
        entity_types::EntityKindSpec,
        shared::{
            criteria::{in_list, matches_opt},
            Paging, SearchResult, StringMatch,
        },
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTypeSearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchEntityTypesQuery {
    pub criteria: EntityTypeSearchCriteria,
    pub fetch_options: EntityTypeFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, kind = %S::KIND))]
pub async fn handle<S: EntityKindSpec>(
    pool: &SqlitePool,
    session: &Session,
    query: SearchEntityTypesQuery,
) -> ApiResult<SearchResult<EntityType<S::Attributes>>> {
    access_log::record(
        &session.user_id,
        &format!("search-{}", S::operation_noun()),
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn, S::KIND)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.codes, &row.code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let types = to_entity_types::<S::Attributes>(&mut conn, S::KIND, window, &query.fetch_options).await?;
    Ok(SearchResult::new(types, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{entity_types::SampleTypes, shared::test_helpers::TestContext};

    #[tokio::test]
    async fn test_search_by_kind() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let result = handle::<SampleTypes>(&ctx.pool, &admin, SearchEntityTypesQuery::default())
            .await
            .unwrap();
        let codes: Vec<_> = result.objects.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["CELL_PLATE", "WELL"]);
    }
}
