use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, Person, PersonFetchOptions};
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
pub struct PersonSearchCriteria {
    pub user_ids: Option<Vec<String>>,
    pub user_id: Option<StringMatch>,
    pub first_name: Option<StringMatch>,
    pub last_name: Option<StringMatch>,
    pub email: Option<StringMatch>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPersonsQuery {
    pub criteria: PersonSearchCriteria,
    pub fetch_options: PersonFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: SearchPersonsQuery) -> ApiResult<SearchResult<Person>> {
    access_log::record(
        &session.user_id,
        "search-persons",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<Person> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.user_ids, &row.user_id))
        .filter(|row| matches_opt(&criteria.user_id, &row.user_id))
        .filter(|row| matches_opt_value(&criteria.first_name, row.first_name.as_deref()))
        .filter(|row| matches_opt_value(&criteria.last_name, row.last_name.as_deref()))
        .filter(|row| matches_opt_value(&criteria.email, row.email.as_deref()))
        .filter(|row| criteria.active.map_or(true, |active| row.active == active))
        .map(|row| row.into_person(&query.fetch_options))
        .collect();

    let (window, total) = query.paging.apply(matching);
    Ok(SearchResult::new(window, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, SPACE_OBSERVER, SPACE_POWER_USER, SPACE_USER};

    #[tokio::test]
    async fn test_search_by_user_id_prefix() {
        let ctx = TestContext::new().await;
        let user = ctx.session(SPACE_USER).await;
        let query = SearchPersonsQuery {
            criteria: PersonSearchCriteria {
                user_id: Some(StringMatch::StartsWith("test_space".into())),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &user, query).await.unwrap();
        let ids: Vec<&str> = result.objects.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec![SPACE_OBSERVER, SPACE_POWER_USER, SPACE_USER]);
    }

    #[tokio::test]
    async fn test_search_inactive() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        sqlx::query("UPDATE persons SET active = 0 WHERE user_id = ?")
            .bind(SPACE_OBSERVER)
            .execute(&ctx.pool)
            .await
            .unwrap();
        let query = SearchPersonsQuery {
            criteria: PersonSearchCriteria {
                active: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.objects[0].user_id, SPACE_OBSERVER);
    }
}
