use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_all, SemanticAnnotation, SemanticAnnotationFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSemanticAnnotationsQuery {
    pub ids: Vec<String>,
    #[serde(default)]
    pub fetch_options: SemanticAnnotationFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetSemanticAnnotationsQuery,
) -> ApiResult<BTreeMap<String, SemanticAnnotation>> {
    access_log::record(
        &session.user_id,
        "get-semantic-annotations",
        &[("SEMANTIC_ANNOTATION_IDS", query.ids.log_repr())],
    );

    let mut conn = pool.acquire().await?;
    Ok(load_all(&mut conn)
        .await?
        .into_iter()
        .filter(|a| query.ids.iter().any(|id| id.trim() == a.perm_id))
        .map(|a| (a.perm_id.clone(), a))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        semantic_annotations::{
            commands::{create, CreateSemanticAnnotationsCommand, OntologyTerm, SemanticAnnotationCreation},
            EntityTypeRef,
        },
        shared::test_helpers::{TestContext, SPACE_OBSERVER},
    };
    use openbis_common::types::EntityKind;

    #[tokio::test]
    async fn test_assignment_annotation_round_trip() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = SemanticAnnotationCreation {
            entity_type_id: Some(EntityTypeRef::new(EntityKind::Experiment, "sirna_hcs")),
            property_type_id: Some("size".into()),
            predicate: OntologyTerm::new("po", "1", "po:measures"),
            descriptor: OntologyTerm::new("do", "3", "do:length"),
        };
        let perm_ids = create::handle(&ctx.pool, &admin, CreateSemanticAnnotationsCommand { creations: vec![creation] })
            .await
            .unwrap();

        let observer = ctx.session(SPACE_OBSERVER).await;
        let query = GetSemanticAnnotationsQuery {
            ids: perm_ids.clone(),
            ..Default::default()
        };
        let found = handle(&ctx.pool, &observer, query).await.unwrap();
        let annotation = &found[&perm_ids[0]];
        assert_eq!(
            annotation.entity_type,
            Some(EntityTypeRef::new(EntityKind::Experiment, "SIRNA_HCS"))
        );
        assert_eq!(annotation.property_type.as_deref(), Some("SIZE"));
        assert_eq!(annotation.predicate, OntologyTerm::new("po", "1", "po:measures"));
        assert_eq!(annotation.descriptor, OntologyTerm::new("do", "3", "do:length"));
    }
}
