use openbis_common::types::DataType;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_property_types, PropertyType, PropertyTypeFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt},
        Paging, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyTypeSearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub label: Option<StringMatch>,
    pub data_type: Option<DataType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPropertyTypesQuery {
    pub criteria: PropertyTypeSearchCriteria,
    pub fetch_options: PropertyTypeFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchPropertyTypesQuery,
) -> ApiResult<SearchResult<PropertyType>> {
    access_log::record(&session.user_id, "search-property-types", &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))]);

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.codes, &row.code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt(&criteria.label, &row.label))
        .filter(|row| criteria.data_type.map_or(true, |t| row.data_type == t.as_str()))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let types = to_property_types(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(types, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::TestContext;

    #[tokio::test]
    async fn test_search_by_data_type() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let query = SearchPropertyTypesQuery {
            criteria: PropertyTypeSearchCriteria {
                data_type: Some(DataType::Integer),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.objects[0].code, "SIZE");
    }
}
