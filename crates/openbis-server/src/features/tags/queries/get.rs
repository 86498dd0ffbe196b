use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, to_tags, Tag, TagFetchOptions};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::shared::{ids::tag_perm_id, tags::owner_and_code, TagId},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTagsQuery {
    pub ids: Vec<TagId>,
    #[serde(default)]
    pub fetch_options: TagFetchOptions,
}

/// Tags keyed by `/owner/CODE`; ids of invisible or unknown tags are omitted
#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id, count = query.ids.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: GetTagsQuery) -> ApiResult<BTreeMap<String, Tag>> {
    access_log::record(&session.user_id, "get-tags", &[("TAG_IDS", query.ids.log_repr())]);

    let mut wanted = Vec::with_capacity(query.ids.len());
    for id in &query.ids {
        if let Ok((owner, code)) = owner_and_code(session, id) {
            wanted.push(tag_perm_id(&owner, &code));
        }
    }

    let mut conn = pool.acquire().await?;
    let rows: Vec<_> = load_rows(&mut conn, session)
        .await?
        .into_iter()
        .filter(|row| wanted.contains(&row.perm_id()))
        .collect();
    let tags = to_tags(&mut conn, rows, &query.fetch_options).await?;
    Ok(tags.into_iter().map(|tag| (tag.perm_id.clone(), tag)).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::ApiError,
        features::{
            experiments::commands::create::{self as experiments, CreateExperimentsCommand, ExperimentCreation},
            shared::{
                test_helpers::{TestContext, SPACE_USER},
                EntityRef,
            },
            tags::commands::create::{self, CreateTagsCommand, TagCreation},
        },
    };

    #[tokio::test]
    async fn test_create_then_get_returns_every_field() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = ExperimentCreation::new("SIRNA_HCS", EntityRef::identifier("/CISD/NEMO"), "EXP-T");
        let exp = experiments::handle(&ctx.pool, &admin, CreateExperimentsCommand { creations: vec![creation] })
            .await
            .unwrap()
            .remove(0);

        let creation = TagCreation {
            description: Some("interesting".into()),
            experiment_ids: vec![EntityRef::identifier("/CISD/NEMO/EXP-T")],
            ..TagCreation::new("TEST_TAG")
        };
        create::handle(&ctx.pool, &admin, CreateTagsCommand { creations: vec![creation] })
            .await
            .unwrap();

        let query = GetTagsQuery {
            ids: vec![TagId::PermId("/admin/TEST_TAG".into()), TagId::Code("UNKNOWN".into())],
            fetch_options: TagFetchOptions {
                experiments: true,
                ..Default::default()
            },
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(found.len(), 1);
        let tag = &found["/admin/TEST_TAG"];
        assert_eq!(tag.code, "TEST_TAG");
        assert_eq!(tag.owner, "admin");
        assert_eq!(tag.description.as_deref(), Some("interesting"));
        assert_eq!(tag.experiments.get("Experiments").unwrap(), &vec![exp]);
        assert!(matches!(tag.samples.get("Samples"), Err(ApiError::NotFetched("Samples"))));
    }

    #[tokio::test]
    async fn test_tags_of_others_are_invisible() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create::handle(&ctx.pool, &admin, CreateTagsCommand { creations: vec![TagCreation::new("PRIVATE")] })
            .await
            .unwrap();

        let user = ctx.session(SPACE_USER).await;
        let query = GetTagsQuery {
            ids: vec![TagId::PermId("/admin/PRIVATE".into())],
            ..Default::default()
        };
        assert!(handle(&ctx.pool, &user, query).await.unwrap().is_empty());
    }
}
