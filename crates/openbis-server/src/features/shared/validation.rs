//! Shared validation utilities
//!
//! ```rust,ignore
//! let code = validate_code(&creation.code, "Space")?;
//! let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;
//! ```

use openbis_common::code::{normalize_code, normalize_internal_code};

use crate::error::{ApiError, ApiResult};

/// Normalize a code, naming the object kind in the error
pub fn validate_code(raw: &str, what: &str) -> ApiResult<String> {
    normalize_code(raw).map_err(|e| ApiError::user(format!("{} code is invalid: {}", what, e)))
}

/// Normalize a code that may live in the internal `$` namespace
pub fn validate_internal_code(raw: &str, what: &str) -> ApiResult<String> {
    normalize_internal_code(raw)
        .map_err(|e| ApiError::user(format!("{} code is invalid: {}", what, e)))
}

/// Require a non-blank string field
pub fn require_non_empty<'a>(value: Option<&'a str>, field: &str) -> ApiResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::user(format!("{} cannot be empty", field))),
    }
}

/// Check the common shape of a delete request: ids present and a reason given.
pub fn validate_deletion<'a, T>(
    ids: &'a Option<Vec<T>>,
    reason: &'a Option<String>,
) -> ApiResult<(&'a [T], &'a str)> {
    let reason = reason
        .as_deref()
        .ok_or_else(|| ApiError::user("Deletion reason cannot be null"))?;
    let ids = ids
        .as_deref()
        .ok_or_else(|| ApiError::user("Entity ids cannot be null"))?;
    Ok((ids, reason))
}

/// Blank strings are stored as NULL
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| if v.trim().is_empty() { None } else { Some(v) })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert_eq!(validate_code("cisd", "Space").unwrap(), "CISD");
        let err = validate_code("", "Space").unwrap_err();
        assert_eq!(err.to_string(), "Space code is invalid: Code cannot be empty");
    }

    #[test]
    fn test_validate_deletion_messages() {
        let ids: Option<Vec<String>> = Some(vec![]);
        let err = validate_deletion(&ids, &None).unwrap_err();
        assert_eq!(err.to_string(), "Deletion reason cannot be null");

        let none: Option<Vec<String>> = None;
        let err = validate_deletion(&none, &Some("r".into())).unwrap_err();
        assert_eq!(err.to_string(), "Entity ids cannot be null");

        let reason = Some("r".to_string());
        let (ids, reason) = validate_deletion(&ids, &reason).unwrap();
        assert!(ids.is_empty());
        assert_eq!(reason, "r");
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty(Some("  "), "Address").is_err());
        assert!(require_non_empty(None, "Address").is_err());
        assert_eq!(require_non_empty(Some(" a "), "Address").unwrap(), "a");
    }
}
