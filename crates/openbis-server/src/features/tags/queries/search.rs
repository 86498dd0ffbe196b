use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_tags, Tag, TagFetchOptions};
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
pub struct TagSearchCriteria {
    /// `/owner/CODE` perm ids
    pub perm_ids: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub description: Option<StringMatch>,
    /// Owner user id
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTagsQuery {
    pub criteria: TagSearchCriteria,
    pub fetch_options: TagFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: SearchTagsQuery) -> ApiResult<SearchResult<Tag>> {
    access_log::record(
        &session.user_id,
        "search-tags",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn, session)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.perm_ids, &row.perm_id()))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt_value(&criteria.description, row.description.as_deref()))
        .filter(|row| criteria.owner.as_ref().map_or(true, |owner| owner == &row.owner))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let tags = to_tags(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(tags, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        shared::test_helpers::{TestContext, SPACE_USER},
        tags::commands::create::{self, CreateTagsCommand, TagCreation},
    };

    #[tokio::test]
    async fn test_admin_sees_all_owners_see_their_own() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let user = ctx.session(SPACE_USER).await;
        create::handle(&ctx.pool, &admin, CreateTagsCommand { creations: vec![TagCreation::new("A_TAG")] })
            .await
            .unwrap();
        create::handle(&ctx.pool, &user, CreateTagsCommand { creations: vec![TagCreation::new("B_TAG")] })
            .await
            .unwrap();

        let all = handle(&ctx.pool, &admin, SearchTagsQuery::default()).await.unwrap();
        assert_eq!(all.total_count, 2);

        let own = handle(&ctx.pool, &user, SearchTagsQuery::default()).await.unwrap();
        assert_eq!(own.total_count, 1);
        assert_eq!(own.objects[0].perm_id, "/test_space_user/B_TAG");

        let query = SearchTagsQuery {
            criteria: TagSearchCriteria {
                code: Some(StringMatch::StartsWith("A_".into())),
                ..Default::default()
            },
            ..Default::default()
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(found.total_count, 1);
        assert_eq!(found.objects[0].code, "A_TAG");
    }

    #[tokio::test]
    async fn test_empty_perm_id_list_matches_nothing() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create::handle(&ctx.pool, &admin, CreateTagsCommand { creations: vec![TagCreation::new("T")] })
            .await
            .unwrap();
        let query = SearchTagsQuery {
            criteria: TagSearchCriteria {
                perm_ids: Some(vec![]),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 0);
        assert!(result.objects.is_empty());
    }
}
