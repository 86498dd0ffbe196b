//! Property values of typed entities
//!
//! Values live in `entity_properties`, one row per entity and property type.
//! They are validated against the data type of the assigned property type;
//! vocabulary values are stored as term codes and material values as
//! `CODE (TYPE)`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use openbis_common::{code::normalize_internal_code, types::DataType, types::EntityKind};
use regex::Regex;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeMap, HashMap};

use crate::{
    db::push_in,
    error::{ApiError, ApiResult},
};

/// Property code to value
pub type PropertyMap = BTreeMap<String, String>;

/// A property type assigned to an entity type
#[derive(Debug, Clone, FromRow)]
pub struct AssignedProperty {
    pub property_type_id: i64,
    pub code: String,
    pub data_type: String,
    pub vocabulary_id: Option<i64>,
    pub material_type_id: Option<i64>,
    pub mandatory: bool,
}

/// Value ready to be written, with resolved references
#[derive(Debug, Clone, PartialEq)]
struct StoredValue {
    value: String,
    vocabulary_term_id: Option<i64>,
    material_id: Option<i64>,
}

pub async fn assignments_of(
    conn: &mut SqliteConnection,
    entity_type_id: i64,
) -> ApiResult<Vec<AssignedProperty>> {
    let rows = sqlx::query_as::<_, AssignedProperty>(
        r#"
        SELECT pt.id AS property_type_id, pt.code, pt.data_type, pt.vocabulary_id,
               pt.material_type_id, pa.mandatory
        FROM property_assignments pa
        JOIN property_types pt ON pt.id = pa.property_type_id
        WHERE pa.entity_type_id = ?
        ORDER BY pa.ordinal
        "#,
    )
    .bind(entity_type_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Parse `CODE (TYPE)` into its parts
pub fn parse_material_reference(value: &str) -> ApiResult<Option<(String, String)>> {
    let pattern = Regex::new(r"^\s*([^\s()]+)\s*\(\s*([^\s()]+)\s*\)\s*$")
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(pattern
        .captures(value)
        .map(|caps| (caps[1].to_uppercase(), caps[2].to_uppercase())))
}

fn invalid(value: &str, code: &str, data_type: DataType) -> ApiError {
    ApiError::user(format!(
        "Value '{}' of property '{}' is not a valid {}",
        value, code, data_type
    ))
}

fn is_timestamp(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Validate `value` for `property`, resolving vocabulary terms and materials
async fn validate_value(
    conn: &mut SqliteConnection,
    property: &AssignedProperty,
    value: &str,
) -> ApiResult<StoredValue> {
    let data_type: DataType = property.data_type.parse()?;
    let plain = |value: String| StoredValue {
        value,
        vocabulary_term_id: None,
        material_id: None,
    };
    let trimmed = value.trim();

    match data_type {
        DataType::Varchar | DataType::MultilineVarchar => Ok(plain(value.to_string())),
        DataType::Integer => trimmed
            .parse::<i64>()
            .map(|v| plain(v.to_string()))
            .map_err(|_| invalid(value, &property.code, data_type)),
        DataType::Real => trimmed
            .parse::<f64>()
            .map(|_| plain(trimmed.to_string()))
            .map_err(|_| invalid(value, &property.code, data_type)),
        DataType::Boolean => match trimmed.to_lowercase().as_str() {
            v @ ("true" | "false") => Ok(plain(v.to_string())),
            _ => Err(invalid(value, &property.code, data_type)),
        },
        DataType::Timestamp => {
            if is_timestamp(trimmed) {
                Ok(plain(trimmed.to_string()))
            } else {
                Err(invalid(value, &property.code, data_type))
            }
        },
        DataType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(|_| plain(trimmed.to_string()))
            .map_err(|_| invalid(value, &property.code, data_type)),
        DataType::Hyperlink => {
            let lower = trimmed.to_lowercase();
            let known = ["http://", "https://", "ftp://", "file://"];
            if known.iter().any(|scheme| lower.starts_with(scheme)) {
                Ok(plain(trimmed.to_string()))
            } else {
                Err(invalid(value, &property.code, data_type))
            }
        },
        DataType::Xml => {
            if trimmed.starts_with('<') && trimmed.ends_with('>') {
                Ok(plain(value.to_string()))
            } else {
                Err(invalid(value, &property.code, data_type))
            }
        },
        DataType::ControlledVocabulary => {
            let term_code = trimmed.to_uppercase();
            let term_id: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM vocabulary_terms WHERE vocabulary_id = ? AND code = ?",
            )
            .bind(property.vocabulary_id)
            .bind(&term_code)
            .fetch_optional(&mut *conn)
            .await?;
            let term_id = term_id.ok_or_else(|| {
                ApiError::user(format!(
                    "Vocabulary value '{}' of property '{}' is not valid",
                    value, property.code
                ))
            })?;
            Ok(StoredValue {
                value: term_code,
                vocabulary_term_id: Some(term_id),
                material_id: None,
            })
        },
        DataType::Material => {
            let (code, type_code) = parse_material_reference(trimmed)?
                .ok_or_else(|| invalid(value, &property.code, data_type))?;
            let row: Option<(i64, i64)> = sqlx::query_as(
                r#"
                SELECT m.id, m.type_id FROM materials m
                JOIN entity_types t ON t.id = m.type_id
                WHERE m.code = ? AND t.code = ? AND t.kind = 'MATERIAL'
                "#,
            )
            .bind(&code)
            .bind(&type_code)
            .fetch_optional(&mut *conn)
            .await?;
            let (material_id, material_type_id) = row.ok_or_else(|| {
                ApiError::user(format!(
                    "Material '{} ({})' of property '{}' does not exist",
                    code, type_code, property.code
                ))
            })?;
            if property
                .material_type_id
                .is_some_and(|expected| expected != material_type_id)
            {
                return Err(invalid(value, &property.code, data_type));
            }
            Ok(StoredValue {
                value: format!("{} ({})", code, type_code),
                vocabulary_term_id: None,
                material_id: Some(material_id),
            })
        },
    }
}

/// Write property values of one entity.
///
/// A blank value removes the property. On creation every mandatory
/// property must be supplied; on update a mandatory property cannot be
/// removed.
pub async fn store(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    entity_id: i64,
    entity_type_id: i64,
    type_code: &str,
    properties: &PropertyMap,
    creating: bool,
) -> ApiResult<()> {
    let assigned = assignments_of(conn, entity_type_id).await?;
    let by_code: HashMap<&str, &AssignedProperty> =
        assigned.iter().map(|a| (a.code.as_str(), a)).collect();

    let mut provided = Vec::new();
    for (raw_code, value) in properties {
        let code = normalize_internal_code(raw_code)?;
        let property = by_code.get(code.as_str()).copied().ok_or_else(|| {
            ApiError::user(format!(
                "Property type '{}' is not assigned to {} type '{}'",
                code,
                kind.label().to_lowercase(),
                type_code
            ))
        })?;

        if value.trim().is_empty() {
            if property.mandatory {
                return Err(ApiError::user(format!(
                    "Value of mandatory property '{}' not specified.",
                    property.code
                )));
            }
            sqlx::query(
                "DELETE FROM entity_properties WHERE entity_kind = ? AND entity_id = ? AND property_type_id = ?",
            )
            .bind(kind.as_str())
            .bind(entity_id)
            .bind(property.property_type_id)
            .execute(&mut *conn)
            .await?;
            continue;
        }

        let stored = validate_value(conn, property, value).await?;
        sqlx::query(
            r#"
            INSERT INTO entity_properties
                (entity_kind, entity_id, property_type_id, value, vocabulary_term_id, material_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (entity_kind, entity_id, property_type_id)
            DO UPDATE SET value = excluded.value,
                          vocabulary_term_id = excluded.vocabulary_term_id,
                          material_id = excluded.material_id
            "#,
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(property.property_type_id)
        .bind(&stored.value)
        .bind(stored.vocabulary_term_id)
        .bind(stored.material_id)
        .execute(&mut *conn)
        .await?;
        provided.push(property.property_type_id);
    }

    if creating {
        if let Some(missing) = assigned
            .iter()
            .find(|a| a.mandatory && !provided.contains(&a.property_type_id))
        {
            return Err(ApiError::user(format!(
                "Value of mandatory property '{}' not specified.",
                missing.code
            )));
        }
    }

    Ok(())
}

#[derive(FromRow)]
struct PropertyRow {
    entity_id: i64,
    code: String,
    value: String,
}

/// Load the property maps of several entities of one kind
pub async fn load(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    entity_ids: &[i64],
) -> ApiResult<HashMap<i64, PropertyMap>> {
    let mut result: HashMap<i64, PropertyMap> = HashMap::new();
    if entity_ids.is_empty() {
        return Ok(result);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT ep.entity_id, pt.code, ep.value FROM entity_properties ep \
         JOIN property_types pt ON pt.id = ep.property_type_id WHERE ep.entity_kind = ",
    );
    builder.push_bind(kind.as_str());
    builder.push(" AND ");
    push_in(&mut builder, "ep.entity_id", entity_ids);

    let rows = builder.build_query_as::<PropertyRow>().fetch_all(&mut *conn).await?;
    for row in rows {
        result.entry(row.entity_id).or_default().insert(row.code, row.value);
    }
    Ok(result)
}

/// Drop every property value of the given entities
pub async fn delete_all(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    entity_ids: &[i64],
) -> ApiResult<()> {
    if entity_ids.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM entity_properties WHERE entity_kind = ");
    builder.push_bind(kind.as_str());
    builder.push(" AND ");
    push_in(&mut builder, "entity_id", entity_ids);
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_material_reference() {
        assert_eq!(
            parse_material_reference("ad3 (virus)").unwrap(),
            Some(("AD3".to_string(), "VIRUS".to_string()))
        );
        assert_eq!(
            parse_material_reference("  GFP(BACTERIUM) ").unwrap(),
            Some(("GFP".to_string(), "BACTERIUM".to_string()))
        );
        assert_eq!(parse_material_reference("GFP").unwrap(), None);
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(is_timestamp("2026-10-16 09:05:07"));
        assert!(is_timestamp("2026-10-16T09:05:07+02:00"));
        assert!(is_timestamp("2026-10-16"));
        assert!(!is_timestamp("yesterday"));
    }
}
