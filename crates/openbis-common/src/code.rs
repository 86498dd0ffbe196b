//! Entity code normalization
//!
//! Codes are case-insensitive and stored uppercased. Internal namespace codes
//! (vocabularies and property types managed by the system) carry a leading `$`.

use crate::error::{CommonError, Result};

/// Prefix marking codes in the internal namespace
pub const INTERNAL_NAMESPACE_PREFIX: char = '$';

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// Trim, validate and uppercase a user supplied code.
pub fn normalize_code(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CommonError::EmptyCode);
    }
    if !trimmed.chars().all(is_code_char) {
        return Err(CommonError::InvalidCode(trimmed.to_string()));
    }
    Ok(trimmed.to_uppercase())
}

/// Same as [`normalize_code`] but accepts a leading `$`.
pub fn normalize_internal_code(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    match trimmed.strip_prefix(INTERNAL_NAMESPACE_PREFIX) {
        Some(rest) => {
            let code = normalize_code(rest)?;
            Ok(format!("{}{}", INTERNAL_NAMESPACE_PREFIX, code))
        },
        None => normalize_code(trimmed),
    }
}

/// Whether the code lives in the internal namespace
pub fn is_internal_code(code: &str) -> bool {
    code.starts_with(INTERNAL_NAMESPACE_PREFIX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uppercases_and_trims() {
        assert_eq!(normalize_code("  test-space ").unwrap(), "TEST-SPACE");
        assert_eq!(normalize_code("a.b_c").unwrap(), "A.B_C");
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert_eq!(normalize_code("   "), Err(CommonError::EmptyCode));
    }

    #[test]
    fn test_normalize_rejects_illegal_characters() {
        for bad in ["has space", "slash/code", "semi;colon", "$internal"] {
            assert!(
                matches!(normalize_code(bad), Err(CommonError::InvalidCode(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_internal_codes() {
        assert_eq!(normalize_internal_code("$plate_geometry").unwrap(), "$PLATE_GEOMETRY");
        assert_eq!(normalize_internal_code("plain").unwrap(), "PLAIN");
        assert!(is_internal_code("$PLATE_GEOMETRY"));
        assert!(!is_internal_code("PLATE_GEOMETRY"));
        assert!(normalize_internal_code("$").is_err());
    }
}
