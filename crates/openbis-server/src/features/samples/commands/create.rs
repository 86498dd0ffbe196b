use chrono::Utc;
use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{resolve_placement, Placement};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    db::{next_perm_id, next_sequence},
    error::{ApiError, ApiResult},
    features::{
        entity_types::{require_type, SampleTypeAttributes, TypeRecord},
        samples::{self, relationships, Relationship, SampleRecord},
        shared::{
            identifiers::sample_identifier,
            properties::{self, PropertyMap},
            tags,
            validation::validate_code,
            EntityRef, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleCreation {
    /// Sample type code
    pub type_id: String,
    /// Left empty when the code is generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub auto_generated_code: bool,
    /// Space code; no space makes a shared sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<EntityRef>,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    #[serde(default)]
    pub parent_ids: Vec<EntityRef>,
    #[serde(default)]
    pub child_ids: Vec<EntityRef>,
    /// Annotations of links made through `parent_ids` or `child_ids`
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl SampleCreation {
    pub fn new(type_id: impl Into<String>, space_id: Option<&str>, code: Option<&str>) -> Self {
        Self {
            type_id: type_id.into(),
            code: code.map(str::to_string),
            auto_generated_code: false,
            space_id: space_id.map(str::to_string),
            project_id: None,
            experiment_id: None,
            container_id: None,
            properties: PropertyMap::new(),
            tag_ids: Vec::new(),
            parent_ids: Vec::new(),
            child_ids: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

crate::struct_log_repr!(
    SampleCreation,
    "SampleCreation",
    "typeId" => type_id,
    "spaceId" => space_id,
    "code" => code
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSamplesCommand {
    pub creations: Vec<SampleCreation>,
}

/// The given code, or a fresh `<prefix><n>` when generation is asked for
async fn sample_code(
    conn: &mut SqliteConnection,
    creation: &SampleCreation,
    attributes: &SampleTypeAttributes,
) -> ApiResult<String> {
    let given = creation.code.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let generate = creation.auto_generated_code || attributes.auto_generated_code;
    match (given, generate) {
        (Some(code), false) => validate_code(code, "Sample"),
        (Some(_), true) if creation.auto_generated_code => {
            Err(ApiError::user("Code should be empty when auto generated code is selected"))
        },
        (Some(code), true) => validate_code(code, "Sample"),
        (None, true) => {
            let n = next_sequence(conn).await?;
            Ok(format!("{}{}", attributes.generated_code_prefix.to_uppercase(), n))
        },
        (None, false) => Err(ApiError::user("Code cannot be empty for a non auto generated code")),
    }
}

/// Reject a code taken in the same context, trashed samples included
async fn check_unique(
    conn: &mut SqliteConnection,
    identifier: &str,
    code: &str,
    entity_type: &TypeRecord,
    attributes: &SampleTypeAttributes,
    has_container: bool,
) -> ApiResult<()> {
    let same_code = samples::with_code(conn, code, true).await?;
    if same_code.iter().any(|other| other.identifier() == identifier) {
        return Err(ApiError::user(format!("Sample '{}' already exists", identifier)));
    }
    if has_container
        && attributes.subcode_unique
        && same_code
            .iter()
            .any(|other| other.type_id == entity_type.id && other.container_id.is_some())
    {
        return Err(ApiError::user(format!(
            "Component code '{}' of sample type '{}' is already used",
            code, entity_type.code
        )));
    }
    Ok(())
}

/// Make the parent and child links of a freshly written sample
pub(crate) async fn link_relatives(
    conn: &mut SqliteConnection,
    sample: &SampleRecord,
    parent_ids: &[EntityRef],
    child_ids: &[EntityRef],
) -> ApiResult<()> {
    for parent in samples::require_all(conn, parent_ids).await? {
        relationships::link(conn, &parent, sample).await?;
    }
    for child in samples::require_all(conn, child_ids).await? {
        relationships::link(conn, sample, &child).await?;
    }
    Ok(())
}

pub(crate) async fn annotate_all(
    conn: &mut SqliteConnection,
    sample: &SampleRecord,
    annotations: &[Relationship],
) -> ApiResult<()> {
    for relationship in annotations {
        let other = samples::require(conn, &relationship.sample_id).await?;
        relationships::annotate(conn, sample, &other, relationship).await?;
    }
    Ok(())
}

async fn insert(
    conn: &mut SqliteConnection,
    session: &Session,
    creation: &SampleCreation,
    entity_type: &TypeRecord,
    placement: &Placement,
    container: Option<&SampleRecord>,
    code: &str,
) -> ApiResult<SampleRecord> {
    let now = Utc::now();
    let perm_id = next_perm_id(conn).await?;
    let id = sqlx::query(
        r#"
        INSERT INTO samples (perm_id, code, type_id, space_id, project_id, experiment_id, container_id,
                             registrator_id, registration_date, modification_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&perm_id)
    .bind(code)
    .bind(entity_type.id)
    .bind(placement.space_id)
    .bind(placement.project_id)
    .bind(placement.experiment_id)
    .bind(container.map(|c| c.id))
    .bind(session.person_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    properties::store(conn, EntityKind::Sample, id, entity_type.id, &entity_type.code, &creation.properties, true)
        .await?;
    let tag_ids = tags::resolve_or_create(conn, session, &creation.tag_ids).await?;
    tags::link(conn, EntityKind::Sample, id, &tag_ids).await?;
    samples::require(conn, &EntityRef::perm_id(perm_id)).await
}

/// Insert the samples, returning their perm ids
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateSamplesCommand,
) -> ApiResult<Vec<String>> {
    let mut perm_ids = Vec::with_capacity(command.creations.len());

    for creation in &command.creations {
        let entity_type = require_type(conn, EntityKind::Sample, &creation.type_id).await?;
        let attributes: SampleTypeAttributes = entity_type.attributes()?;
        let placement = resolve_placement(
            conn,
            creation.space_id.as_deref(),
            creation.project_id.as_ref(),
            creation.experiment_id.as_ref(),
        )
        .await?;
        let container = match &creation.container_id {
            Some(id) => Some(samples::require(conn, id).await?),
            None => None,
        };

        let code = sample_code(conn, creation, &attributes).await?;
        let identifier = sample_identifier(
            placement.space_code.as_deref(),
            placement.project_code.as_deref(),
            container.as_ref().map(|c| c.code.as_str()),
            &code,
        );
        let role = if placement.space_id.is_some() { Role::User } else { Role::Admin };
        placement.authorize(session, role, &identifier)?;
        check_unique(conn, &identifier, &code, &entity_type, &attributes, container.is_some()).await?;

        let sample = insert(conn, session, creation, &entity_type, &placement, container.as_ref(), &code).await?;
        link_relatives(conn, &sample, &creation.parent_ids, &creation.child_ids).await?;
        annotate_all(conn, &sample, &creation.relationships).await?;

        outbox::record(conn, EntityKind::Sample, &sample.perm_id, IndexAction::Upsert).await?;
        tracing::debug!(sample = %identifier, perm_id = %sample.perm_id, "Sample registered");
        perm_ids.push(sample.perm_id);
    }
    Ok(perm_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: CreateSamplesCommand) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-samples", &[("NEW_SAMPLES", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let perm_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(perm_ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, SPACE_OBSERVER, SPACE_USER};

    fn command(creations: Vec<SampleCreation>) -> CreateSamplesCommand {
        CreateSamplesCommand { creations }
    }

    async fn identifier_of(ctx: &TestContext, perm_id: &str) -> String {
        let mut conn = ctx.pool.acquire().await.unwrap();
        samples::require(&mut conn, &EntityRef::perm_id(perm_id))
            .await
            .unwrap()
            .identifier()
    }

    #[tokio::test]
    async fn test_space_project_and_shared_identifiers() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut in_project = SampleCreation::new("CELL_PLATE", None, Some("P1"));
        in_project.project_id = Some(EntityRef::identifier("/CISD/NEMO"));
        let perm_ids = handle(
            &ctx.pool,
            &admin,
            command(vec![
                SampleCreation::new("CELL_PLATE", Some("cisd"), Some("s1")),
                in_project,
                SampleCreation::new("CELL_PLATE", None, Some("SHARED")),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(identifier_of(&ctx, &perm_ids[0]).await, "/CISD/S1");
        assert_eq!(identifier_of(&ctx, &perm_ids[1]).await, "/CISD/NEMO/P1");
        assert_eq!(identifier_of(&ctx, &perm_ids[2]).await, "/SHARED");
    }

    #[tokio::test]
    async fn test_auto_generated_codes_use_type_prefix() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut first = SampleCreation::new("WELL", Some("CISD"), None);
        first.auto_generated_code = true;
        let second = first.clone();
        let perm_ids = handle(&ctx.pool, &admin, command(vec![first, second])).await.unwrap();

        let first = identifier_of(&ctx, &perm_ids[0]).await;
        let second = identifier_of(&ctx, &perm_ids[1]).await;
        assert!(first.starts_with("/CISD/W"), "{}", first);
        assert_ne!(first, second);

        let mut both = SampleCreation::new("WELL", Some("CISD"), Some("X"));
        both.auto_generated_code = true;
        let err = handle(&ctx.pool, &admin, command(vec![both])).await.unwrap_err();
        assert_eq!(err.to_string(), "Code should be empty when auto generated code is selected");

        let err = handle(&ctx.pool, &admin, command(vec![SampleCreation::new("WELL", Some("CISD"), None)]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Code cannot be empty for a non auto generated code");
    }

    #[tokio::test]
    async fn test_container_and_relationships() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(
            &ctx.pool,
            &admin,
            command(vec![
                SampleCreation::new("CELL_PLATE", Some("CISD"), Some("PLATE")),
                SampleCreation::new("CELL_PLATE", Some("CISD"), Some("MOTHER")),
            ]),
        )
        .await
        .unwrap();

        let mut well = SampleCreation::new("WELL", Some("CISD"), Some("A01"));
        well.container_id = Some(EntityRef::identifier("/CISD/PLATE"));
        well.parent_ids.push(EntityRef::identifier("/CISD/MOTHER"));
        let mut relationship = Relationship::new(EntityRef::identifier("/CISD/MOTHER"));
        relationship.parent_annotations.insert("ROLE".into(), "donor".into());
        well.relationships.push(relationship);
        let perm_ids = handle(&ctx.pool, &admin, command(vec![well])).await.unwrap();

        assert_eq!(identifier_of(&ctx, &perm_ids[0]).await, "/CISD/PLATE:A01");
        let annotations: String = sqlx::query_scalar("SELECT parent_annotations FROM sample_relationships")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
        assert_eq!(annotations, r#"{"ROLE":"donor"}"#);
    }

    #[tokio::test]
    async fn test_annotation_without_link_is_rejected() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, command(vec![SampleCreation::new("CELL_PLATE", Some("CISD"), Some("OTHER"))]))
            .await
            .unwrap();
        let mut sample = SampleCreation::new("CELL_PLATE", Some("CISD"), Some("S1"));
        sample.relationships.push(Relationship::new(EntityRef::identifier("/CISD/OTHER")));
        let err = handle(&ctx.pool, &admin, command(vec![sample])).await.unwrap_err();
        assert_eq!(err.to_string(), "Sample '/CISD/OTHER' is neither a parent nor a child of '/CISD/S1'");
    }

    #[tokio::test]
    async fn test_duplicate_and_experiment_mismatch() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, command(vec![SampleCreation::new("CELL_PLATE", Some("CISD"), Some("S1"))]))
            .await
            .unwrap();
        let err = handle(&ctx.pool, &admin, command(vec![SampleCreation::new("WELL", Some("CISD"), Some("s1"))]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Sample '/CISD/S1' already exists");

        let mut sample = SampleCreation::new("CELL_PLATE", Some("TEST-SPACE"), Some("S2"));
        sample.project_id = Some(EntityRef::identifier("/CISD/NEMO"));
        let err = handle(&ctx.pool, &admin, command(vec![sample])).await.unwrap_err();
        assert_eq!(err.to_string(), "Sample space must be the same as project space");
    }

    #[tokio::test]
    async fn test_roles() {
        let ctx = TestContext::new().await;
        let user = ctx.session(SPACE_USER).await;
        handle(&ctx.pool, &user, command(vec![SampleCreation::new("CELL_PLATE", Some("TEST-SPACE"), Some("S1"))]))
            .await
            .unwrap();
        let err = handle(&ctx.pool, &user, command(vec![SampleCreation::new("CELL_PLATE", None, Some("S2"))]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with SampleIdentifier = [/S2]");

        let observer = ctx.session(SPACE_OBSERVER).await;
        let err = handle(
            &ctx.pool,
            &observer,
            command(vec![SampleCreation::new("CELL_PLATE", Some("TEST-SPACE"), Some("S3"))]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with SpacePermId = [TEST-SPACE]");
    }
}
