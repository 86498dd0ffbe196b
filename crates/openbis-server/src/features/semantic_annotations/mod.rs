//! Semantic annotations
//!
//! An annotation ties an ontology predicate/descriptor pair to exactly one
//! target: an entity type, a property type, or the assignment of a property
//! type to an entity type (both set).

pub mod commands;
pub mod queries;
pub mod routes;

use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;

use crate::{
    error::{ApiError, ApiResult},
    features::entity_types::require_type,
};

pub use commands::{
    CreateSemanticAnnotationsCommand, DeleteSemanticAnnotationsCommand, OntologyTerm, SemanticAnnotationCreation,
    SemanticAnnotationUpdate, UpdateSemanticAnnotationsCommand,
};
pub use queries::{
    GetSemanticAnnotationsQuery, SearchSemanticAnnotationsQuery, SemanticAnnotation, SemanticAnnotationFetchOptions,
    SemanticAnnotationSearchCriteria,
};
pub use routes::semantic_annotations_routes;

/// Entity type addressed by kind and code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityTypeRef {
    pub kind: EntityKind,
    pub code: String,
}

impl EntityTypeRef {
    pub fn new(kind: EntityKind, code: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
        }
    }
}

impl fmt::Display for EntityTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code.trim().to_uppercase(), self.kind)
    }
}

crate::display_log_repr!(EntityTypeRef);

/// Row ids of an annotation target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Target {
    pub entity_type_id: Option<i64>,
    pub property_type_id: Option<i64>,
}

pub(crate) async fn resolve_target(
    conn: &mut SqliteConnection,
    entity_type: Option<&EntityTypeRef>,
    property_type: Option<&str>,
) -> ApiResult<Target> {
    let entity_type_id = match entity_type {
        Some(id) => Some(require_type(conn, id.kind, &id.code).await?.id),
        None => None,
    };
    let property_type_id = match property_type {
        Some(code) => {
            let code = code.trim().to_uppercase();
            let id: Option<i64> = sqlx::query_scalar("SELECT id FROM property_types WHERE code = ?")
                .bind(&code)
                .fetch_optional(&mut *conn)
                .await?;
            Some(id.ok_or_else(|| ApiError::not_found("PropertyTypePermId", code))?)
        },
        None => None,
    };

    match (entity_type_id, property_type_id) {
        (None, None) => {
            return Err(ApiError::user(
                "Entity type, property type or property assignment has to be specified",
            ))
        },
        (Some(type_id), Some(property_type_id)) => {
            let assigned: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM property_assignments WHERE entity_type_id = ? AND property_type_id = ?",
            )
            .bind(type_id)
            .bind(property_type_id)
            .fetch_one(&mut *conn)
            .await?;
            if assigned == 0 {
                return Err(ApiError::not_found(
                    "PropertyAssignmentPermId",
                    format!(
                        "{}, {}",
                        entity_type.map(ToString::to_string).unwrap_or_default(),
                        property_type.unwrap_or_default().trim().to_uppercase()
                    ),
                ));
            }
        },
        _ => {},
    }
    Ok(Target {
        entity_type_id,
        property_type_id,
    })
}
