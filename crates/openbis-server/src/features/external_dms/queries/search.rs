use openbis_common::types::AddressType;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_all, ExternalDms};
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
pub struct ExternalDmsSearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub label: Option<StringMatch>,
    pub address_type: Option<AddressType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchExternalDmsQuery {
    pub criteria: ExternalDmsSearchCriteria,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchExternalDmsQuery,
) -> ApiResult<SearchResult<ExternalDms>> {
    access_log::record(
        &session.user_id,
        "search-external-data-management-systems",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_all(&mut conn)
        .await?
        .into_iter()
        .filter(|dms| in_list(&criteria.codes, &dms.code))
        .filter(|dms| matches_opt(&criteria.code, &dms.code))
        .filter(|dms| matches_opt_value(&criteria.label, dms.label.as_deref()))
        .filter(|dms| criteria.address_type.map_or(true, |t| dms.address_type == t.as_str()))
        .collect();

    let (window, total) = query.paging.apply(matching);
    Ok(SearchResult::new(window, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::TestContext;

    #[tokio::test]
    async fn test_search_by_address_type() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        sqlx::query(
            "INSERT INTO external_dms (code, address, address_type, registration_date) VALUES \
             ('A', 'https://a', 'URL', '2026-01-01T00:00:00Z'), ('B', 'h:/b', 'FILE_SYSTEM', '2026-01-01T00:00:00Z')",
        )
        .execute(&ctx.pool)
        .await
        .unwrap();

        let query = SearchExternalDmsQuery {
            criteria: ExternalDmsSearchCriteria {
                address_type: Some(AddressType::FileSystem),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.objects[0].code, "B");
    }
}
