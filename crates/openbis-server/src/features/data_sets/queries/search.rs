use openbis_common::types::{DataSetKind, EntityKind};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_data_sets, DataSet, DataSetFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt, matches_opt_value, matches_properties},
        properties, tags, Paging, PropertyMatch, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetSearchCriteria {
    pub codes: Option<Vec<String>>,
    pub code: Option<StringMatch>,
    pub type_code: Option<StringMatch>,
    pub kind: Option<DataSetKind>,
    /// Experiment identifier
    pub experiment: Option<StringMatch>,
    /// Sample identifier
    pub sample: Option<StringMatch>,
    pub space: Option<StringMatch>,
    pub properties: Vec<PropertyMatch>,
    /// Tag perm ids, all of which must be present
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDataSetsQuery {
    pub criteria: DataSetSearchCriteria,
    pub fetch_options: DataSetFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchDataSetsQuery,
) -> ApiResult<SearchResult<DataSet>> {
    access_log::record(
        &session.user_id,
        "search-data-sets",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let scope = session.read_scope();
    let kind = criteria.kind.map(|kind| kind.to_string());
    let mut conn = pool.acquire().await?;
    let mut matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| scope.allows(row.space_id, row.project_id))
        .filter(|row| in_list(&criteria.codes, &row.code))
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt(&criteria.type_code, &row.type_code))
        .filter(|row| kind.as_ref().map_or(true, |kind| *kind == row.kind))
        .filter(|row| matches_opt_value(&criteria.experiment, row.experiment_identifier().as_deref()))
        .filter(|row| matches_opt_value(&criteria.sample, row.sample_identifier().as_deref()))
        .filter(|row| matches_opt_value(&criteria.space, row.space_code.as_deref()))
        .collect();

    if !criteria.properties.is_empty() {
        let ids: Vec<i64> = matching.iter().map(|row| row.id).collect();
        let values = properties::load(&mut conn, EntityKind::DataSet, &ids).await?;
        matching.retain(|row| matches_properties(&criteria.properties, values.get(&row.id)));
    }
    if !criteria.tags.is_empty() {
        let ids: Vec<i64> = matching.iter().map(|row| row.id).collect();
        let tagged = tags::load(&mut conn, EntityKind::DataSet, &ids).await?;
        matching.retain(|row| {
            let own = tagged.get(&row.id);
            criteria
                .tags
                .iter()
                .all(|tag| own.is_some_and(|own| own.contains(tag)))
        });
    }

    let (window, total) = query.paging.apply(matching);
    let data_sets = to_data_sets(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(data_sets, total))
}
