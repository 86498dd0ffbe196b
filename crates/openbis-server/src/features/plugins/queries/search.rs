use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{load_rows, to_plugin, Plugin, PluginFetchOptions};
use crate::{
    access_log,
    auth::Session,
    error::ApiResult,
    features::shared::{
        criteria::{in_list, matches_opt},
        Paging, SearchResult, StringMatch,
    },
};
use openbis_common::types::{EntityKind, PluginType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSearchCriteria {
    pub names: Option<Vec<String>>,
    pub name: Option<StringMatch>,
    pub plugin_type: Option<PluginType>,
    pub entity_kind: Option<EntityKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPluginsQuery {
    pub criteria: PluginSearchCriteria,
    pub fetch_options: PluginFetchOptions,
    pub paging: Paging,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, query: SearchPluginsQuery) -> ApiResult<SearchResult<Plugin>> {
    access_log::record(&session.user_id, "search-plugins", &[("SEARCH_CRITERIA", format!("{:?}", query.criteria))]);

    let criteria = &query.criteria;
    let mut conn = pool.acquire().await?;
    let matching: Vec<_> = load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| in_list(&criteria.names, &row.name))
        .filter(|row| matches_opt(&criteria.name, &row.name))
        .filter(|row| criteria.plugin_type.map_or(true, |t| row.plugin_type == t.as_str()))
        // plugins without a kind apply to every kind
        .filter(|row| {
            criteria
                .entity_kind
                .map_or(true, |k| row.entity_kind.as_deref().map_or(true, |rk| rk == k.as_str()))
        })
        .collect();

    let (window, total) = query.paging.apply(matching);
    let plugins = window.into_iter().map(|row| to_plugin(row, &query.fetch_options)).collect();
    Ok(SearchResult::new(plugins, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        plugins::{
            commands::create::{self, CreatePluginsCommand, PluginCreation},
            queries::get::{self, GetPluginsQuery},
        },
        shared::test_helpers::{TestContext, INSTANCE_OBSERVER},
    };

    fn plugin(name: &str, plugin_type: PluginType, kind: Option<EntityKind>) -> PluginCreation {
        PluginCreation {
            name: name.into(),
            description: Some(format!("{} plugin", name)),
            plugin_type,
            entity_kind: kind,
            script: Some("def calculate():\n    return 1".into()),
            available: true,
        }
    }

    #[tokio::test]
    async fn test_search_by_type_and_kind() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creations = vec![
            plugin("anyKind", PluginType::EntityValidation, None),
            plugin("samplesOnly", PluginType::EntityValidation, Some(EntityKind::Sample)),
            plugin("dynamic", PluginType::DynamicProperty, None),
        ];
        create::handle(&ctx.pool, &admin, CreatePluginsCommand { creations }).await.unwrap();

        let observer = ctx.session(INSTANCE_OBSERVER).await;
        let query = SearchPluginsQuery {
            criteria: PluginSearchCriteria {
                plugin_type: Some(PluginType::EntityValidation),
                entity_kind: Some(EntityKind::Experiment),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = handle(&ctx.pool, &observer, query).await.unwrap();
        let names: Vec<_> = result.objects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["anyKind"]);
    }

    #[tokio::test]
    async fn test_script_only_when_fetched() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creations = vec![plugin("dynamic", PluginType::DynamicProperty, None)];
        create::handle(&ctx.pool, &admin, CreatePluginsCommand { creations }).await.unwrap();

        let plain = get::handle(
            &ctx.pool,
            &admin,
            GetPluginsQuery {
                ids: vec!["dynamic".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(plain["dynamic"].script.get("Script").is_err());

        let full = get::handle(
            &ctx.pool,
            &admin,
            GetPluginsQuery {
                ids: vec!["dynamic".into(), "missing".into()],
                fetch_options: PluginFetchOptions {
                    script: true,
                    registrator: true,
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(full.len(), 1);
        assert!(full["dynamic"].script.get("Script").unwrap().is_some());
        assert_eq!(full["dynamic"].registrator.get("Registrator").unwrap().as_deref(), Some("admin"));
    }
}
