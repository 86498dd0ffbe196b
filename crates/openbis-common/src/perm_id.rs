//! Permanent identifier generation
//!
//! Perm ids have the shape `<yyyyMMddHHmmssSSS>-<sequence>`; the sequence
//! value comes from the database so ids stay unique across restarts.

use chrono::{DateTime, Utc};

/// Build a perm id from a timestamp and a sequence value
pub fn generate_perm_id(now: DateTime<Utc>, sequence: i64) -> String {
    format!("{}-{}", now.format("%Y%m%d%H%M%S%3f"), sequence)
}

/// Check that a string has the perm id shape
pub fn is_perm_id(value: &str) -> bool {
    match value.split_once('-') {
        Some((stamp, seq)) => {
            stamp.len() == 17
                && stamp.chars().all(|c| c.is_ascii_digit())
                && !seq.is_empty()
                && seq.chars().all(|c| c.is_ascii_digit())
        },
        None => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_perm_id_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 5, 7).unwrap();
        let id = generate_perm_id(now, 42);
        assert_eq!(id, "20261016090507000-42");
        assert!(is_perm_id(&id));
    }

    #[test]
    fn test_is_perm_id_rejects_codes() {
        assert!(!is_perm_id("SAMPLE-1"));
        assert!(!is_perm_id("20261016090507000-"));
        assert!(!is_perm_id("/CISD/S1"));
    }
}
