use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_deletions, Deletion, DeletionFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_id_list, matches_opt},
        Paging, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionSearchCriteria {
    pub ids: Option<Vec<i64>>,
    pub reason: Option<StringMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDeletionsQuery {
    pub criteria: DeletionSearchCriteria,
    pub fetch_options: DeletionFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: SearchDeletionsQuery) -> ApiResult<SearchResult<Deletion>> {
    access_log::record(
        &session.user_id,
        "search-deletions",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn, session)
        .await?
        .into_iter()
        .filter(|row| in_id_list(&criteria.ids, row.id))
        .filter(|row| matches_opt(&criteria.reason, &row.reason))
        .collect();

    let (window, total) = query.paging.apply(matching);
    let deletions = to_deletions(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(deletions, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        deletions::DeletedObject,
        samples::commands::{
            create::{self as create_samples, CreateSamplesCommand, SampleCreation},
            delete::{self as delete_samples, DeleteSamplesCommand},
        },
        shared::{
            test_helpers::{TestContext, SPACE_OBSERVER, SPACE_POWER_USER},
            EntityRef,
        },
    };
    use openbis_common::types::EntityKind;

    #[tokio::test]
    async fn test_search_with_deleted_objects() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let power_user = ctx.session(SPACE_POWER_USER).await;
        let creations = vec![
            SampleCreation::new("CELL_PLATE", Some("TEST-SPACE"), Some("P1")),
            SampleCreation::new("CELL_PLATE", Some("TEST-SPACE"), Some("P2")),
        ];
        create_samples::handle(&ctx.pool, &power_user, CreateSamplesCommand { creations })
            .await
            .unwrap();
        for code in ["P1", "P2"] {
            delete_samples::handle(
                &ctx.pool,
                &power_user,
                DeleteSamplesCommand {
                    ids: Some(vec![EntityRef::identifier(format!("/TEST-SPACE/{}", code))]),
                    reason: Some(format!("drop {}", code)),
                },
            )
            .await
            .unwrap();
        }

        let query = SearchDeletionsQuery {
            criteria: DeletionSearchCriteria {
                reason: Some(StringMatch::EndsWith("p2".into())),
                ..Default::default()
            },
            fetch_options: DeletionFetchOptions { deleted_objects: true },
            ..Default::default()
        };
        let found = handle(&ctx.pool, &power_user, query).await.unwrap();
        assert_eq!(found.total_count, 1);
        let deletion = &found.objects[0];
        assert_eq!(deletion.reason, "drop P2");
        assert_eq!(deletion.registrator.as_deref(), Some(SPACE_POWER_USER));
        assert_eq!(deletion.total_samples_count, 1);
        let objects: &Vec<DeletedObject> = deletion.deleted_objects.get("DeletedObjects").unwrap();
        assert_eq!(objects[0].entity_kind, EntityKind::Sample);
        assert_eq!(objects[0].identifier, "/TEST-SPACE/P2");
        assert_eq!(objects[0].entity_type_code, "CELL_PLATE");

        let all = handle(&ctx.pool, &admin, SearchDeletionsQuery::default()).await.unwrap();
        assert_eq!(all.total_count, 2);
        assert!(all.objects[0].deleted_objects.is_not_fetched());

        let observer = ctx.session(SPACE_OBSERVER).await;
        let none = handle(&ctx.pool, &observer, SearchDeletionsQuery::default()).await.unwrap();
        assert_eq!(none.total_count, 0);
    }
}
