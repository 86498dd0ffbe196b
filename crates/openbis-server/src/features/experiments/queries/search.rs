use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_experiments, Experiment, ExperimentFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt, matches_properties},
        identifiers::project_identifier,
        properties, tags, Paging, PropertyMatch, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSearchCriteria {
    pub perm_ids: Option<Vec<String>>,
    pub identifiers: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub type_code: Option<StringMatch>,
    /// Project identifier
    pub project: Option<StringMatch>,
    pub space: Option<StringMatch>,
    /// Tag perm ids; the experiment must carry one of them
    pub tags: Option<Vec<String>>,
    pub properties: Vec<PropertyMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchExperimentsQuery {
    pub criteria: ExperimentSearchCriteria,
    pub fetch_options: ExperimentFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchExperimentsQuery,
) -> ApiResult<SearchResult<Experiment>> {
    access_log::record(
        &session.user_id,
        "search-experiments",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let candidates: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| scope.allows(Some(row.space_id), Some(row.project_id)))
        .filter(|row| in_list(&criteria.perm_ids, &row.perm_id))
        .filter(|row| in_list(&criteria.identifiers, &row.identifier()))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt(&criteria.type_code, &row.type_code))
        .filter(|row| matches_opt(&criteria.project, &project_identifier(&row.space_code, &row.project_code)))
        .filter(|row| matches_opt(&criteria.space, &row.space_code))
        .collect();

    let ids: Vec<i64> = candidates.iter().map(|row| row.id).collect();
    let values = if criteria.properties.is_empty() {
        Default::default()
    } else {
        properties::load(&mut conn, EntityKind::Experiment, &ids).await?
    };
    let tag_ids = if criteria.tags.is_some() {
        tags::load(&mut conn, EntityKind::Experiment, &ids).await?
    } else {
        Default::default()
    };
    let matching: Vec<_> = candidates
        .into_iter()
        .filter(|row| matches_properties(&criteria.properties, values.get(&row.id)))
        .filter(|row| match &criteria.tags {
            None => true,
            Some(wanted) => tag_ids
                .get(&row.id)
                .is_some_and(|have| have.iter().any(|t| wanted.iter().any(|w| w.eq_ignore_ascii_case(t)))),
        })
        .collect();

    let (window, total) = query.paging.apply(matching);
    let experiments = to_experiments(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(experiments, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        experiments::commands::create::{self, CreateExperimentsCommand, ExperimentCreation},
        shared::{test_helpers::TestContext, EntityRef},
    };

    async fn create_experiments(ctx: &TestContext) {
        let admin = ctx.admin().await;
        let creations = ["A1", "A2", "B1"]
            .iter()
            .map(|code| {
                let mut creation = ExperimentCreation::new("SIRNA_HCS", EntityRef::identifier("/CISD/NEMO"), *code);
                creation.properties.insert("ORGANISM".into(), if code.starts_with('A') { "RAT" } else { "HUMAN" }.into());
                creation
            })
            .collect();
        create::handle(&ctx.pool, &admin, CreateExperimentsCommand { creations })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_by_property_with_paging() {
        let ctx = TestContext::new().await;
        create_experiments(&ctx).await;
        let admin = ctx.admin().await;
        let query = SearchExperimentsQuery {
            criteria: ExperimentSearchCriteria {
                properties: vec![PropertyMatch {
                    code: "ORGANISM".into(),
                    value: StringMatch::Equals("rat".into()),
                }],
                ..Default::default()
            },
            paging: Paging::new(1, 10),
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 2);
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0].code, "A2");
    }

    #[tokio::test]
    async fn test_empty_id_list_matches_nothing() {
        let ctx = TestContext::new().await;
        create_experiments(&ctx).await;
        let admin = ctx.admin().await;
        let query = SearchExperimentsQuery {
            criteria: ExperimentSearchCriteria {
                perm_ids: Some(vec![]),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 0);
    }
}
