//! Create property types command
//!
//! The data type decides which references are allowed: a vocabulary is
//! required for, and only for, CONTROLLEDVOCABULARY; a material type may only
//! restrict MATERIAL properties.

use chrono::Utc;
use openbis_common::types::{DataType, EntityKind};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::{ApiError, ApiResult},
    features::{
        entity_types::require_type,
        shared::{
            error_helpers::map_unique_violation,
            validation::{require_non_empty, validate_internal_code},
        },
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyTypeCreation {
    pub code: String,
    pub label: String,
    pub description: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_type_id: Option<String>,
    #[serde(default)]
    pub managed_internally: bool,
}

impl PropertyTypeCreation {
    pub fn new(code: impl Into<String>, data_type: DataType) -> Self {
        let code = code.into();
        Self {
            label: code.clone(),
            description: code.clone(),
            code,
            data_type,
            vocabulary_id: None,
            material_type_id: None,
            managed_internally: false,
        }
    }

    /// Check the data type against the supplied references
    pub fn validate(&self) -> ApiResult<()> {
        match (self.data_type, &self.vocabulary_id) {
            (DataType::ControlledVocabulary, None) => {
                return Err(ApiError::user(
                    "Vocabulary cannot be null for a property type with data type CONTROLLEDVOCABULARY",
                ))
            },
            (data_type, Some(_)) if data_type != DataType::ControlledVocabulary => {
                return Err(ApiError::user(format!(
                    "Vocabulary cannot be set for a property type with data type {}",
                    data_type
                )))
            },
            _ => {},
        }
        if self.material_type_id.is_some() && self.data_type != DataType::Material {
            return Err(ApiError::user(format!(
                "Material type cannot be set for a property type with data type {}",
                self.data_type
            )));
        }
        Ok(())
    }
}

crate::struct_log_repr!(PropertyTypeCreation, "PropertyTypeCreation", "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePropertyTypesCommand {
    pub creations: Vec<PropertyTypeCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreatePropertyTypesCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating property types")?;

    let now = Utc::now();
    let mut codes = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_internal_code(&creation.code, "Property type")?;
        let label = require_non_empty(Some(&creation.label), "Label")?;
        let description = require_non_empty(Some(&creation.description), "Description")?;
        creation.validate()?;

        let vocabulary_id = match &creation.vocabulary_id {
            Some(vocabulary) => {
                let vocabulary = vocabulary.trim().to_uppercase();
                let id: Option<i64> = sqlx::query_scalar("SELECT id FROM vocabularies WHERE code = ?")
                    .bind(&vocabulary)
                    .fetch_optional(&mut *conn)
                    .await?;
                Some(id.ok_or_else(|| ApiError::not_found("VocabularyPermId", vocabulary))?)
            },
            None => None,
        };
        let material_type_id = match &creation.material_type_id {
            Some(material_type) => Some(require_type(conn, EntityKind::Material, material_type).await?.id),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO property_types
                (code, label, description, data_type, vocabulary_id, material_type_id,
                 managed_internally, registrator_id, registration_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code)
        .bind(label)
        .bind(description)
        .bind(creation.data_type.as_str())
        .bind(vocabulary_id)
        .bind(material_type_id)
        .bind(creation.managed_internally)
        .bind(session.person_id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Property type '{}' already exists", code)))?;
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreatePropertyTypesCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        "create-property-types",
        &[("NEW_PROPERTY_TYPES", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let codes = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(codes)
}
