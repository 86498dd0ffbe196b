pub mod create;
pub mod delete;
pub mod update;

use openbis_common::types::{EntityKind, PluginType};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::{
    error::{ApiError, ApiResult},
    features::{plugins, shared::validation::validate_internal_code},
};

pub use create::{CreateEntityTypesCommand, EntityTypeCreation};
pub use delete::DeleteEntityTypesCommand;
pub use update::{AssignmentsUpdate, EntityTypeUpdate, UpdateEntityTypesCommand};

fn default_true() -> bool {
    true
}

/// A property type to assign to an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAssignmentCreation {
    pub property_type_id: String,
    #[serde(default)]
    pub mandatory: bool,
    /// Position among the assignments; appended when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default = "default_true")]
    pub show_in_edit_views: bool,
    /// Dynamic or managed property plugin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
}

impl PropertyAssignmentCreation {
    pub fn new(property_type_id: impl Into<String>) -> Self {
        Self {
            property_type_id: property_type_id.into(),
            mandatory: false,
            ordinal: None,
            section: None,
            show_in_edit_views: true,
            plugin_id: None,
        }
    }
}

/// Resolve a validation plugin for a type of `kind`
pub(crate) async fn validation_plugin_id(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    name: &str,
) -> ApiResult<i64> {
    let plugin = plugins::require(conn, name).await?;
    if plugin.plugin_type != PluginType::EntityValidation.as_str() {
        return Err(ApiError::user(format!(
            "Plugin '{}' is not an entity validation plugin",
            plugin.name
        )));
    }
    if plugin.entity_kind.as_deref().is_some_and(|k| k != kind.as_str()) {
        return Err(ApiError::user(format!(
            "Plugin '{}' cannot validate {} types",
            plugin.name,
            kind.label().to_lowercase()
        )));
    }
    Ok(plugin.id)
}

async fn property_type_id(conn: &mut SqliteConnection, code: &str) -> ApiResult<i64> {
    let code = validate_internal_code(code, "Property type")?;
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM property_types WHERE code = ?")
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
    id.ok_or_else(|| ApiError::not_found("PropertyTypePermId", code))
}

async fn property_plugin_id(conn: &mut SqliteConnection, name: &str) -> ApiResult<i64> {
    let plugin = plugins::require(conn, name).await?;
    if plugin.plugin_type == PluginType::EntityValidation.as_str() {
        return Err(ApiError::user(format!(
            "Plugin '{}' cannot be bound to a property assignment",
            plugin.name
        )));
    }
    Ok(plugin.id)
}

/// Number of instances of a type, trashed ones included
pub(crate) async fn instance_count(conn: &mut SqliteConnection, kind: EntityKind, type_id: i64) -> ApiResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE type_id = ?", kind.table());
    let count: i64 = sqlx::query_scalar(&sql).bind(type_id).fetch_one(&mut *conn).await?;
    Ok(count)
}

/// Insert or rewrite one assignment of `type_id`
pub(crate) async fn assign(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    type_id: i64,
    type_code: &str,
    assignment: &PropertyAssignmentCreation,
    fallback_ordinal: i64,
) -> ApiResult<()> {
    let property_type_id = property_type_id(conn, &assignment.property_type_id).await?;
    let plugin_id = match &assignment.plugin_id {
        Some(name) => Some(property_plugin_id(conn, name).await?),
        None => None,
    };

    let existing: Option<bool> = sqlx::query_scalar(
        "SELECT mandatory FROM property_assignments WHERE entity_type_id = ? AND property_type_id = ?",
    )
    .bind(type_id)
    .bind(property_type_id)
    .fetch_optional(&mut *conn)
    .await?;

    let newly_mandatory = assignment.mandatory && existing != Some(true);
    if newly_mandatory && instance_count(conn, kind, type_id).await? > 0 {
        return Err(ApiError::user(format!(
            "Property type '{}' cannot be made mandatory for {} type '{}' which already has instances",
            assignment.property_type_id.trim().to_uppercase(),
            kind.label().to_lowercase(),
            type_code
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO property_assignments
            (entity_type_id, property_type_id, ordinal, mandatory, section, show_in_edit_views, plugin_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (entity_type_id, property_type_id)
        DO UPDATE SET ordinal = excluded.ordinal,
                      mandatory = excluded.mandatory,
                      section = excluded.section,
                      show_in_edit_views = excluded.show_in_edit_views,
                      plugin_id = excluded.plugin_id
        "#,
    )
    .bind(type_id)
    .bind(property_type_id)
    .bind(assignment.ordinal.unwrap_or(fallback_ordinal))
    .bind(assignment.mandatory)
    .bind(&assignment.section)
    .bind(assignment.show_in_edit_views)
    .bind(plugin_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Drop the assignment of `property_code`, refusing when instances hold values for it
pub(crate) async fn unassign(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    type_id: i64,
    type_code: &str,
    property_code: &str,
) -> ApiResult<()> {
    let property_type_id = property_type_id(conn, property_code).await?;
    let sql = format!(
        "SELECT COUNT(*) FROM entity_properties ep JOIN {} e ON e.id = ep.entity_id \
         WHERE ep.entity_kind = ? AND ep.property_type_id = ? AND e.type_id = ?",
        kind.table()
    );
    let values: i64 = sqlx::query_scalar(&sql)
        .bind(kind.as_str())
        .bind(property_type_id)
        .bind(type_id)
        .fetch_one(&mut *conn)
        .await?;
    if values > 0 {
        return Err(ApiError::user(format!(
            "Property type '{}' cannot be unassigned from {} type '{}' because {} value(s) exist",
            property_code.trim().to_uppercase(),
            kind.label().to_lowercase(),
            type_code,
            values
        )));
    }

    sqlx::query("DELETE FROM property_assignments WHERE entity_type_id = ? AND property_type_id = ?")
        .bind(type_id)
        .bind(property_type_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
