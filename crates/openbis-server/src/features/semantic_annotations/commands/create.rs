//! Create semantic annotations command

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::OntologyTerm;
use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    db::next_perm_id,
    error::ApiResult,
    features::semantic_annotations::{resolve_target, EntityTypeRef},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnnotationCreation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type_id: Option<EntityTypeRef>,
    /// Property type code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type_id: Option<String>,
    #[serde(default)]
    pub predicate: OntologyTerm,
    #[serde(default)]
    pub descriptor: OntologyTerm,
}

impl LogRepr for SemanticAnnotationCreation {
    fn log_repr(&self) -> String {
        let mut target = Vec::new();
        if let Some(entity_type) = &self.entity_type_id {
            target.push(format!("entityTypeId={}", entity_type));
        }
        if let Some(property_type) = &self.property_type_id {
            target.push(format!("propertyTypeId={}", property_type));
        }
        format!("SemanticAnnotationCreation[{}]", target.join(","))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSemanticAnnotationsCommand {
    pub creations: Vec<SemanticAnnotationCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateSemanticAnnotationsCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating semantic annotations")?;

    let now = Utc::now();
    let mut perm_ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let target = resolve_target(
            conn,
            creation.entity_type_id.as_ref(),
            creation.property_type_id.as_deref(),
        )
        .await?;
        let perm_id = next_perm_id(conn).await?;

        sqlx::query(
            r#"
            INSERT INTO semantic_annotations
                (perm_id, entity_type_id, property_type_id,
                 predicate_ontology_id, predicate_ontology_version, predicate_accession_id,
                 descriptor_ontology_id, descriptor_ontology_version, descriptor_accession_id,
                 creation_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&perm_id)
        .bind(target.entity_type_id)
        .bind(target.property_type_id)
        .bind(&creation.predicate.ontology_id)
        .bind(&creation.predicate.ontology_version)
        .bind(&creation.predicate.accession_id)
        .bind(&creation.descriptor.ontology_id)
        .bind(&creation.descriptor.ontology_version)
        .bind(&creation.descriptor.accession_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        perm_ids.push(perm_id);
    }
    Ok(perm_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateSemanticAnnotationsCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        "create-semantic-annotations",
        &[("NEW_SEMANTIC_ANNOTATIONS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let perm_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(perm_ids)
}
