//! Entity type registry
//!
//! Sample, experiment, data set and material types share one table and one
//! set of commands. The per-kind differences (the extra attributes a type
//! carries and how they are validated) live behind [`EntityKindSpec`]; each
//! kind is a marker type implementing it and the routes are instantiated once
//! per marker.

pub mod commands;
pub mod queries;
pub mod routes;

use openbis_common::types::EntityKind;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::fmt::Debug;

use crate::error::{ApiError, ApiResult};

pub use routes::entity_type_routes;

/// Per-kind behaviour of the type registry
pub trait EntityKindSpec: Send + Sync + 'static {
    const KIND: EntityKind;

    /// Kind specific attributes, stored as JSON next to the type
    type Attributes: Serialize + DeserializeOwned + Default + Clone + Debug + PartialEq + Send + Sync + 'static;

    fn validate_attributes(_attributes: &Self::Attributes) -> ApiResult<()> {
        Ok(())
    }

    /// `sample-types`, `data-set-types`, ...
    fn operation_noun() -> &'static str {
        match Self::KIND {
            EntityKind::Experiment => "experiment-types",
            EntityKind::Sample => "sample-types",
            EntityKind::DataSet => "data-set-types",
            EntityKind::Material => "material-types",
        }
    }
}

pub struct SampleTypes;
pub struct ExperimentTypes;
pub struct DataSetTypes;
pub struct MaterialTypes;

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "S".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleTypeAttributes {
    #[serde(default = "default_true")]
    pub listable: bool,
    pub show_container: bool,
    pub show_parents: bool,
    pub show_parent_metadata: bool,
    pub subcode_unique: bool,
    pub auto_generated_code: bool,
    #[serde(default = "default_prefix")]
    pub generated_code_prefix: String,
}

impl Default for SampleTypeAttributes {
    fn default() -> Self {
        Self {
            listable: true,
            show_container: false,
            show_parents: false,
            show_parent_metadata: false,
            subcode_unique: false,
            auto_generated_code: false,
            generated_code_prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetTypeAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_data_set_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_data_set_path: Option<String>,
    pub disallow_deletion: bool,
}

/// Experiment and material types carry nothing extra
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoAttributes {}

impl EntityKindSpec for SampleTypes {
    const KIND: EntityKind = EntityKind::Sample;
    type Attributes = SampleTypeAttributes;

    fn validate_attributes(attributes: &SampleTypeAttributes) -> ApiResult<()> {
        let prefix = attributes.generated_code_prefix.trim();
        if prefix.is_empty() {
            return Err(ApiError::user("Generated code prefix cannot be empty"));
        }
        openbis_common::code::normalize_code(prefix)
            .map_err(|e| ApiError::user(format!("Generated code prefix is invalid: {}", e)))?;
        Ok(())
    }
}

impl EntityKindSpec for ExperimentTypes {
    const KIND: EntityKind = EntityKind::Experiment;
    type Attributes = NoAttributes;
}

impl EntityKindSpec for DataSetTypes {
    const KIND: EntityKind = EntityKind::DataSet;
    type Attributes = DataSetTypeAttributes;

    fn validate_attributes(attributes: &DataSetTypeAttributes) -> ApiResult<()> {
        if let Some(pattern) = &attributes.main_data_set_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                ApiError::user(format!("Main data set pattern '{}' is invalid: {}", pattern, e))
            })?;
        }
        Ok(())
    }
}

impl EntityKindSpec for MaterialTypes {
    const KIND: EntityKind = EntityKind::Material;
    type Attributes = NoAttributes;
}

/// A resolved entity type
#[derive(Debug, Clone, FromRow)]
pub struct TypeRecord {
    pub id: i64,
    pub code: String,
    pub attributes: String,
}

impl TypeRecord {
    pub fn attributes<A: DeserializeOwned + Default>(&self) -> ApiResult<A> {
        if self.attributes.trim().is_empty() {
            return Ok(A::default());
        }
        Ok(serde_json::from_str(&self.attributes)?)
    }
}

pub async fn resolve_type(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    code: &str,
) -> ApiResult<Option<TypeRecord>> {
    let record = sqlx::query_as::<_, TypeRecord>(
        "SELECT id, code, attributes FROM entity_types WHERE kind = ? AND code = ?",
    )
    .bind(kind.as_str())
    .bind(code.trim().to_uppercase())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

/// Resolve a type referenced from a creation, failing when it is unknown
pub async fn require_type(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    code: &str,
) -> ApiResult<TypeRecord> {
    resolve_type(conn, kind, code)
        .await?
        .ok_or_else(|| ApiError::not_found("EntityTypePermId", format!("{} ({})", code.trim().to_uppercase(), kind)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_attribute_defaults() {
        let attributes: SampleTypeAttributes = serde_json::from_str("{}").unwrap();
        assert!(attributes.listable);
        assert_eq!(attributes.generated_code_prefix, "S");
        assert!(SampleTypes::validate_attributes(&attributes).is_ok());

        let bad = SampleTypeAttributes {
            generated_code_prefix: " ".into(),
            ..Default::default()
        };
        assert!(SampleTypes::validate_attributes(&bad).is_err());
    }

    #[test]
    fn test_data_set_pattern_must_compile() {
        let bad = DataSetTypeAttributes {
            main_data_set_pattern: Some("(".into()),
            ..Default::default()
        };
        assert!(DataSetTypes::validate_attributes(&bad).is_err());
    }

    #[test]
    fn test_operation_nouns() {
        assert_eq!(DataSetTypes::operation_noun(), "data-set-types");
        assert_eq!(ExperimentTypes::operation_noun(), "experiment-types");
    }
}
