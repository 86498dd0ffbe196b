use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_materials, Material, MaterialFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{matches_opt, matches_properties},
        properties, Paging, PropertyMatch, SearchResult, StringMatch,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSearchCriteria {
    pub code: Option<StringMatch>,
    pub type_code: Option<StringMatch>,
    pub properties: Vec<PropertyMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchMaterialsQuery {
    pub criteria: MaterialSearchCriteria,
    pub fetch_options: MaterialFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: SearchMaterialsQuery,
) -> ApiResult<SearchResult<Material>> {
    access_log::record(
        &session.user_id,
        "search-materials",
        &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))],
    );

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let mut matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| matches_opt(&criteria.code, &row.code))
        .filter(|row| matches_opt(&criteria.type_code, &row.type_code))
        .collect();
    if !criteria.properties.is_empty() {
        let ids: Vec<i64> = matching.iter().map(|row| row.id).collect();
        let values = properties::load(&mut conn, EntityKind::Material, &ids).await?;
        matching.retain(|row| matches_properties(&criteria.properties, values.get(&row.id)));
    }

    let (window, total) = query.paging.apply(matching);
    let materials = to_materials(&mut conn, window, &query.fetch_options).await?;
    Ok(SearchResult::new(materials, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        materials::commands::create::{self, CreateMaterialsCommand, MaterialCreation},
        shared::test_helpers::TestContext,
    };

    #[tokio::test]
    async fn test_search_by_property_with_paging() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut creations = Vec::new();
        for code in ["AD3", "AD5", "HIV"] {
            let mut creation = MaterialCreation::new("VIRUS", code);
            let family = if code.starts_with("AD") { "adenovirus" } else { "retrovirus" };
            creation.properties.insert("DESCRIPTION".into(), family.into());
            creations.push(creation);
        }
        create::handle(&ctx.pool, &admin, CreateMaterialsCommand { creations })
            .await
            .unwrap();

        let query = SearchMaterialsQuery {
            criteria: MaterialSearchCriteria {
                properties: vec![PropertyMatch {
                    code: "DESCRIPTION".into(),
                    value: StringMatch::Equals("ADENOVIRUS".into()),
                }],
                ..Default::default()
            },
            paging: Paging::new(1, 10),
            ..Default::default()
        };
        let result = handle(&ctx.pool, &admin, query).await.unwrap();
        assert_eq!(result.total_count, 2);
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0].code, "AD5");
    }
}
