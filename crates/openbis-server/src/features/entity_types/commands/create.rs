//! Create entity types command

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{assign, validation_plugin_id, PropertyAssignmentCreation};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::ApiResult,
    features::{
        entity_types::EntityKindSpec,
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, validate_internal_code},
        },
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityTypeCreation<A> {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_plugin_id: Option<String>,
    #[serde(default)]
    pub property_assignments: Vec<PropertyAssignmentCreation>,
    #[serde(flatten)]
    pub attributes: A,
}

impl<A> LogRepr for EntityTypeCreation<A> {
    fn log_repr(&self) -> String {
        format!("EntityTypeCreation[code={}]", self.code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEntityTypesCommand<A> {
    pub creations: Vec<EntityTypeCreation<A>>,
}

pub async fn execute<S: EntityKindSpec>(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateEntityTypesCommand<S::Attributes>,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, &format!("Creating {} types", S::KIND.label().to_lowercase()))?;

    let now = Utc::now();
    let mut codes = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_internal_code(&creation.code, "Entity type")?;
        S::validate_attributes(&creation.attributes)?;

        let plugin_id = match &creation.validation_plugin_id {
            Some(name) => Some(validation_plugin_id(conn, S::KIND, name).await?),
            None => None,
        };

        let type_id = sqlx::query(
            r#"
            INSERT INTO entity_types (kind, code, description, validation_plugin_id, attributes, modification_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(S::KIND.as_str())
        .bind(&code)
        .bind(blank_to_none(creation.description.clone()))
        .bind(plugin_id)
        .bind(serde_json::to_string(&creation.attributes)?)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            map_unique_violation(e, || format!("{} type '{}' already exists", S::KIND.label(), code))
        })?
        .last_insert_rowid();

        for (position, assignment) in creation.property_assignments.iter().enumerate() {
            assign(conn, S::KIND, type_id, &code, assignment, position as i64 + 1).await?;
        }
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, kind = %S::KIND))]
pub async fn handle<S: EntityKindSpec>(
    pool: &SqlitePool,
    session: &Session,
    command: CreateEntityTypesCommand<S::Attributes>,
) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        &format!("create-{}", S::operation_noun()),
        &[("NEW_ENTITY_TYPES", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let codes = execute::<S>(&mut tx, session, &command).await?;
    tx.commit().await?;

    tracing::info!(count = codes.len(), "Entity types created");
    Ok(codes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::ApiError,
        features::{
            entity_types::{DataSetTypeAttributes, DataSetTypes, ExperimentTypes, NoAttributes, SampleTypeAttributes, SampleTypes},
            shared::test_helpers::{TestContext, INSTANCE_OBSERVER},
        },
    };

    fn sample_type(code: &str) -> EntityTypeCreation<SampleTypeAttributes> {
        EntityTypeCreation {
            code: code.into(),
            description: Some("new type".into()),
            validation_plugin_id: None,
            property_assignments: vec![
                PropertyAssignmentCreation::new("DESCRIPTION"),
                PropertyAssignmentCreation {
                    mandatory: true,
                    ..PropertyAssignmentCreation::new("SIZE")
                },
            ],
            attributes: SampleTypeAttributes {
                auto_generated_code: true,
                generated_code_prefix: "NT".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_sample_type_with_assignments() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = CreateEntityTypesCommand {
            creations: vec![sample_type("new_type")],
        };
        let codes = handle::<SampleTypes>(&ctx.pool, &admin, command).await.unwrap();
        assert_eq!(codes, vec!["NEW_TYPE"]);

        let attributes: String =
            sqlx::query_scalar("SELECT attributes FROM entity_types WHERE code = 'NEW_TYPE'")
                .fetch_one(&ctx.pool)
                .await
                .unwrap();
        let parsed: SampleTypeAttributes = serde_json::from_str(&attributes).unwrap();
        assert_eq!(parsed.generated_code_prefix, "NT");
        assert_eq!(
            ctx.count(
                "SELECT COUNT(*) FROM property_assignments pa JOIN entity_types t ON t.id = pa.entity_type_id \
                 WHERE t.code = 'NEW_TYPE' AND pa.mandatory = 1"
            )
            .await,
            1
        );
    }

    #[tokio::test]
    async fn test_same_code_allowed_for_other_kind() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = CreateEntityTypesCommand {
            creations: vec![EntityTypeCreation::<NoAttributes> {
                code: "CELL_PLATE".into(),
                ..Default::default()
            }],
        };
        handle::<ExperimentTypes>(&ctx.pool, &admin, command).await.unwrap();

        let command = CreateEntityTypesCommand {
            creations: vec![sample_type("CELL_PLATE")],
        };
        let err = handle::<SampleTypes>(&ctx.pool, &admin, command).await.unwrap_err();
        assert_eq!(err.to_string(), "Sample type 'CELL_PLATE' already exists");
    }

    #[tokio::test]
    async fn test_unknown_property_type_names_the_id() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut creation = sample_type("BROKEN");
        creation.property_assignments.push(PropertyAssignmentCreation::new("NOPE"));
        let err = handle::<SampleTypes>(&ctx.pool, &admin, CreateEntityTypesCommand { creations: vec![creation] })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Object with PropertyTypePermId = [NOPE] has not been found");
        assert_eq!(ctx.count("SELECT COUNT(*) FROM entity_types WHERE code = 'BROKEN'").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_pattern_rejected() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = CreateEntityTypesCommand {
            creations: vec![EntityTypeCreation {
                code: "BAD_PATTERN".into(),
                attributes: DataSetTypeAttributes {
                    main_data_set_pattern: Some("[".into()),
                    ..Default::default()
                },
                ..Default::default()
            }],
        };
        let err = handle::<DataSetTypes>(&ctx.pool, &admin, command).await.unwrap_err();
        assert!(matches!(err, ApiError::UserFailure(_)));
    }

    #[tokio::test]
    async fn test_observer_rejected() {
        let ctx = TestContext::new().await;
        let observer = ctx.session(INSTANCE_OBSERVER).await;
        let command = CreateEntityTypesCommand {
            creations: vec![sample_type("NOT_ALLOWED")],
        };
        let err = handle::<SampleTypes>(&ctx.pool, &observer, command).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));
    }

    #[test]
    fn test_attributes_are_read_flat() {
        let json = serde_json::json!({
            "code": "FLAT",
            "auto_generated_code": true,
            "generated_code_prefix": "FL"
        });
        let creation: EntityTypeCreation<SampleTypeAttributes> = serde_json::from_value(json).unwrap();
        assert!(creation.attributes.auto_generated_code);
        assert!(creation.attributes.listable);
        assert_eq!(creation.attributes.generated_code_prefix, "FL");
    }
}
