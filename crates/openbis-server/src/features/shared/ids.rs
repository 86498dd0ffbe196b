//! Object identifiers accepted by the API
//!
//! Most kinds are addressed by a plain code string. Projects, experiments and
//! samples accept either a perm id or a path identifier; materials, terms and
//! tags have composite ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Perm id or path identifier of a project, experiment or sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    PermId(String),
    Identifier(String),
}

impl EntityRef {
    pub fn perm_id(value: impl Into<String>) -> Self {
        EntityRef::PermId(value.into())
    }

    pub fn identifier(value: impl Into<String>) -> Self {
        EntityRef::Identifier(value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityRef::PermId(value) | EntityRef::Identifier(value) => value,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Materials are unique per type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialPermId {
    pub code: String,
    pub type_code: String,
}

impl MaterialPermId {
    pub fn new(code: impl Into<String>, type_code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            type_code: type_code.into(),
        }
    }
}

impl fmt::Display for MaterialPermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.type_code)
    }
}

/// Terms are unique per vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VocabularyTermId {
    pub vocabulary_code: String,
    pub code: String,
}

impl VocabularyTermId {
    pub fn new(vocabulary_code: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            vocabulary_code: vocabulary_code.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for VocabularyTermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.vocabulary_code)
    }
}

/// `/owner/CODE` perm id, or a bare code of a tag owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagId {
    PermId(String),
    Code(String),
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagId::PermId(value) | TagId::Code(value) => f.write_str(value),
        }
    }
}

pub fn tag_perm_id(owner: &str, code: &str) -> String {
    format!("/{}/{}", owner, code)
}

crate::display_log_repr!(EntityRef, MaterialPermId, VocabularyTermId, TagId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shapes() {
        let id: EntityRef = serde_json::from_str(r#"{"identifier": "/CISD/NEMO"}"#).unwrap();
        assert_eq!(id, EntityRef::identifier("/CISD/NEMO"));

        let tag: TagId = serde_json::from_str(r#"{"code": "MY_TAG"}"#).unwrap();
        assert_eq!(tag, TagId::Code("MY_TAG".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(MaterialPermId::new("AD3", "VIRUS").to_string(), "AD3 (VIRUS)");
        assert_eq!(VocabularyTermId::new("ORGANISM", "RAT").to_string(), "RAT (ORGANISM)");
        assert_eq!(tag_perm_id("admin", "TEST"), "/admin/TEST");
    }
}
