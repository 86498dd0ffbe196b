pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::{commands::OntologyTerm, EntityTypeRef};
use crate::error::ApiResult;

pub use get::GetSemanticAnnotationsQuery;
pub use search::{SearchSemanticAnnotationsQuery, SemanticAnnotationSearchCriteria};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticAnnotationFetchOptions {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnnotation {
    pub perm_id: String,
    pub entity_type: Option<EntityTypeRef>,
    pub property_type: Option<String>,
    pub predicate: OntologyTerm,
    pub descriptor: OntologyTerm,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AnnotationRow {
    pub perm_id: String,
    pub entity_kind: Option<String>,
    pub entity_type_code: Option<String>,
    pub property_type_code: Option<String>,
    pub predicate_ontology_id: Option<String>,
    pub predicate_ontology_version: Option<String>,
    pub predicate_accession_id: Option<String>,
    pub descriptor_ontology_id: Option<String>,
    pub descriptor_ontology_version: Option<String>,
    pub descriptor_accession_id: Option<String>,
    pub creation_date: DateTime<Utc>,
}

impl AnnotationRow {
    pub fn into_annotation(self) -> ApiResult<SemanticAnnotation> {
        let entity_type = match (self.entity_kind, self.entity_type_code) {
            (Some(kind), Some(code)) => Some(EntityTypeRef::new(kind.parse()?, code)),
            _ => None,
        };
        Ok(SemanticAnnotation {
            perm_id: self.perm_id,
            entity_type,
            property_type: self.property_type_code,
            predicate: OntologyTerm {
                ontology_id: self.predicate_ontology_id,
                ontology_version: self.predicate_ontology_version,
                accession_id: self.predicate_accession_id,
            },
            descriptor: OntologyTerm {
                ontology_id: self.descriptor_ontology_id,
                ontology_version: self.descriptor_ontology_version,
                accession_id: self.descriptor_accession_id,
            },
            creation_date: self.creation_date,
        })
    }
}

pub(crate) async fn load_all(conn: &mut SqliteConnection) -> ApiResult<Vec<SemanticAnnotation>> {
    let rows = sqlx::query_as::<_, AnnotationRow>(
        r#"
        SELECT a.perm_id, t.kind AS entity_kind, t.code AS entity_type_code, p.code AS property_type_code,
               a.predicate_ontology_id, a.predicate_ontology_version, a.predicate_accession_id,
               a.descriptor_ontology_id, a.descriptor_ontology_version, a.descriptor_accession_id,
               a.creation_date
        FROM semantic_annotations a
        LEFT JOIN entity_types t ON t.id = a.entity_type_id
        LEFT JOIN property_types p ON p.id = a.property_type_id
        ORDER BY a.perm_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(AnnotationRow::into_annotation).collect()
}
