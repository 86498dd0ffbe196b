//! Building blocks of search criteria
//!
//! Criteria fields are optional; an absent field matches everything while an
//! empty list matches nothing.

use serde::{Deserialize, Serialize};

use super::properties::PropertyMap;

/// Case-insensitive string predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMatch {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl StringMatch {
    pub fn matches(&self, value: &str) -> bool {
        let value = value.to_uppercase();
        match self {
            StringMatch::Equals(expected) => value == expected.to_uppercase(),
            StringMatch::Contains(part) => value.contains(&part.to_uppercase()),
            StringMatch::StartsWith(prefix) => value.starts_with(&prefix.to_uppercase()),
            StringMatch::EndsWith(suffix) => value.ends_with(&suffix.to_uppercase()),
        }
    }
}

/// Absent criterion matches, present one must match `value`
pub fn matches_opt(criterion: &Option<StringMatch>, value: &str) -> bool {
    criterion.as_ref().map_or(true, |c| c.matches(value))
}

/// Same as [`matches_opt`] for optional values; a missing value never matches a criterion
pub fn matches_opt_value(criterion: &Option<StringMatch>, value: Option<&str>) -> bool {
    match (criterion, value) {
        (None, _) => true,
        (Some(c), Some(v)) => c.matches(v),
        (Some(_), None) => false,
    }
}

/// Membership test against an optional id list, ignoring case
pub fn in_list(list: &Option<Vec<String>>, value: &str) -> bool {
    list.as_ref()
        .map_or(true, |values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
}

/// Membership test for numeric ids
pub fn in_id_list(list: &Option<Vec<i64>>, value: i64) -> bool {
    list.as_ref().map_or(true, |values| values.contains(&value))
}

/// Predicate on one property value of a typed entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMatch {
    pub code: String,
    pub value: StringMatch,
}

/// Every property criterion must match a value of the entity
pub fn matches_properties(criteria: &[PropertyMatch], values: Option<&PropertyMap>) -> bool {
    criteria.iter().all(|criterion| {
        values
            .and_then(|values| values.get(&criterion.code.trim().to_uppercase()))
            .is_some_and(|value| criterion.value.matches(value))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_string_match_ignores_case() {
        assert!(StringMatch::Equals("cisd".into()).matches("CISD"));
        assert!(StringMatch::Contains("space".into()).matches("TEST-SPACE"));
        assert!(StringMatch::StartsWith("TEST".into()).matches("TEST-SPACE"));
        assert!(StringMatch::EndsWith("group".into()).matches("TESTGROUP"));
        assert!(!StringMatch::Equals("CIS".into()).matches("CISD"));
    }

    #[test]
    fn test_lists() {
        assert!(in_list(&None, "A"));
        assert!(!in_list(&Some(vec![]), "A"));
        assert!(in_list(&Some(vec!["a".into()]), "A"));
        assert!(!in_id_list(&Some(vec![]), 1));
    }

    #[test]
    fn test_property_criteria() {
        let mut values = PropertyMap::new();
        values.insert("ORGANISM".into(), "RAT".into());
        let criterion = PropertyMatch {
            code: "organism".into(),
            value: StringMatch::Equals("rat".into()),
        };
        assert!(matches_properties(&[], None));
        assert!(matches_properties(&[criterion.clone()], Some(&values)));
        assert!(!matches_properties(&[criterion], None));
    }

    #[test]
    fn test_serde_shape() {
        let parsed: StringMatch = serde_json::from_str(r#"{"starts_with": "TEST"}"#).unwrap();
        assert_eq!(parsed, StringMatch::StartsWith("TEST".into()));
    }
}
