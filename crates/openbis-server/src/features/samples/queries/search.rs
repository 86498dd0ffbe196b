use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_samples, Sample, SampleFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt, matches_opt_value, matches_properties},
        properties, Paging, PropertyMatch, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleSearchCriteria {
    pub perm_ids: Option<Vec<String>>,
    pub identifiers: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub type_code: Option<StringMatch>,
    pub space: Option<StringMatch>,
    /// Project identifier
    pub project: Option<StringMatch>,
    /// Experiment identifier
    pub experiment: Option<StringMatch>,
    /// Only shared samples when `true`, only space samples when `false`
    pub shared: Option<bool>,
    pub properties: Vec<PropertyMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSamplesQuery {
    pub criteria: SampleSearchCriteria,
    pub fetch_options: SampleFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchSamplesQuery,
) -> ApiResult<SearchResult<Sample>> {
    access_log::record(
        &session.user_id,
        "search-samples",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    let candidates: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| scope.allows(row.space_id, row.project_id))
        .filter(|row| in_list(&criteria.perm_ids, &row.perm_id))
        .filter(|row| in_list(&criteria.identifiers, &row.identifier()))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt(&criteria.type_code, &row.type_code))
        .filter(|row| matches_opt_value(&criteria.space, row.space_code.as_deref()))
        .filter(|row| matches_opt_value(&criteria.project, row.project_identifier().as_deref()))
        .filter(|row| matches_opt_value(&criteria.experiment, row.experiment_identifier().as_deref()))
        .filter(|row| criteria.shared.map_or(true, |shared| shared == row.space_id.is_none()))
        .collect();

    let matching = if criteria.properties.is_empty() {
        candidates
    } else {
        let ids: Vec<i64> = candidates.iter().map(|row| row.id).collect();
        let values = properties::load(&mut conn, EntityKind::Sample, &ids).await?;
        candidates
            .into_iter()
            .filter(|row| matches_properties(&criteria.properties, values.get(&row.id)))
            .collect()
    };

    let (window, total) = query.paging.apply(matching);
    let samples = to_samples(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(samples, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        samples::commands::create::{self, CreateSamplesCommand, SampleCreation},
        shared::test_helpers::TestContext,
    };

    #[tokio::test]
    async fn test_search_shared_and_by_type() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creations = vec![
            SampleCreation::new("CELL_PLATE", None, Some("SHARED")),
            SampleCreation::new("CELL_PLATE", Some("CISD"), Some("PLATE")),
            SampleCreation::new("WELL", Some("CISD"), Some("WELL")),
        ];
        create::handle(&ctx.pool, &admin, CreateSamplesCommand { creations })
            .await
            .unwrap();

        let shared = SearchSamplesQuery {
            criteria: SampleSearchCriteria {
                shared: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, shared).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.objects[0].identifier, "/SHARED");

        let plates = SearchSamplesQuery {
            criteria: SampleSearchCriteria {
                type_code: Some(StringMatch::Equals("cell_plate".into())),
                space: Some(StringMatch::Equals("CISD".into())),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, plates).await.unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.objects[0].code, "PLATE");
    }
}
