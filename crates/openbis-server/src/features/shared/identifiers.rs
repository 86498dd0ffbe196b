//! Path-like identifiers of spaces, projects, experiments and samples

use crate::error::{ApiError, ApiResult};

pub fn project_identifier(space: &str, project: &str) -> String {
    format!("/{}/{}", space, project)
}

pub fn experiment_identifier(space: &str, project: &str, code: &str) -> String {
    format!("/{}/{}/{}", space, project, code)
}

/// `/SPACE/CODE`, `/SPACE/PROJECT/CODE` or `/CODE` for shared samples.
/// Component samples are written `CONTAINER:CODE`.
pub fn sample_identifier(
    space: Option<&str>,
    project: Option<&str>,
    container: Option<&str>,
    code: &str,
) -> String {
    let local = match container {
        Some(container) => format!("{}:{}", container, code),
        None => code.to_string(),
    };
    match (space, project) {
        (Some(space), Some(project)) => format!("/{}/{}/{}", space, project, local),
        (Some(space), None) => format!("/{}/{}", space, local),
        (None, _) => format!("/{}", local),
    }
}

/// Split an identifier into its upper cased path segments
pub fn split_identifier(identifier: &str, expected: &[usize]) -> ApiResult<Vec<String>> {
    let trimmed = identifier.trim();
    let segments: Vec<String> = trimmed
        .strip_prefix('/')
        .map(|rest| rest.split('/').map(|s| s.trim().to_uppercase()).collect())
        .unwrap_or_default();

    let valid = !segments.is_empty()
        && segments.iter().all(|s| !s.is_empty())
        && expected.contains(&segments.len());
    if valid {
        Ok(segments)
    } else {
        Err(ApiError::user(format!("Invalid identifier '{}'", identifier)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_identifiers() {
        assert_eq!(sample_identifier(Some("CISD"), None, None, "S1"), "/CISD/S1");
        assert_eq!(
            sample_identifier(Some("CISD"), Some("NEMO"), None, "S1"),
            "/CISD/NEMO/S1"
        );
        assert_eq!(sample_identifier(None, None, None, "S1"), "/S1");
        assert_eq!(
            sample_identifier(Some("CISD"), None, Some("PLATE"), "A01"),
            "/CISD/PLATE:A01"
        );
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(split_identifier("/cisd/nemo", &[2]).unwrap(), vec!["CISD", "NEMO"]);
        assert!(split_identifier("cisd/nemo", &[2]).is_err());
        assert!(split_identifier("/cisd//x", &[3]).is_err());
        assert!(split_identifier("/cisd", &[2, 3]).is_err());
    }
}
