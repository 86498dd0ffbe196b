pub mod create;
pub mod delete;
pub mod update;

use serde::{Deserialize, Serialize};

pub use create::{CreateSemanticAnnotationsCommand, SemanticAnnotationCreation};
pub use delete::DeleteSemanticAnnotationsCommand;
pub use update::{SemanticAnnotationUpdate, UpdateSemanticAnnotationsCommand};

/// One ontology reference: `ontology_id` at `ontology_version`, term `accession_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyTerm {
    pub ontology_id: Option<String>,
    pub ontology_version: Option<String>,
    pub accession_id: Option<String>,
}

impl OntologyTerm {
    pub fn new(ontology_id: &str, ontology_version: &str, accession_id: &str) -> Self {
        Self {
            ontology_id: Some(ontology_id.to_string()),
            ontology_version: Some(ontology_version.to_string()),
            accession_id: Some(accession_id.to_string()),
        }
    }
}
