//! External data management systems holding content copies of link data sets

pub mod commands;
pub mod queries;
pub mod routes;

use openbis_common::types::AddressType;
use regex::Regex;
use sqlx::{FromRow, SqliteConnection};

use crate::error::{ApiError, ApiResult};

pub use commands::{CreateExternalDmsCommand, DeleteExternalDmsCommand, ExternalDmsCreation, ExternalDmsUpdate, UpdateExternalDmsCommand};
pub use queries::{ExternalDms, ExternalDmsSearchCriteria, GetExternalDmsQuery, SearchExternalDmsQuery};
pub use routes::external_dms_routes;

#[derive(Debug, Clone, FromRow)]
pub struct ExternalDmsRecord {
    pub id: i64,
    pub code: String,
    pub address: String,
    pub address_type: String,
}

impl ExternalDmsRecord {
    pub fn address_type(&self) -> ApiResult<AddressType> {
        Ok(self.address_type.parse()?)
    }
}

pub async fn resolve(conn: &mut SqliteConnection, code: &str) -> ApiResult<Option<ExternalDmsRecord>> {
    let record = sqlx::query_as::<_, ExternalDmsRecord>(
        "SELECT id, code, address, address_type FROM external_dms WHERE code = ?",
    )
    .bind(code.trim().to_uppercase())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, code: &str) -> ApiResult<ExternalDmsRecord> {
    resolve(conn, code)
        .await?
        .ok_or_else(|| ApiError::not_found("ExternalDmsPermId", code.trim().to_uppercase()))
}

/// Check an address against its type; file system addresses read
/// `host:/absolute/path`, so `scheme://` URLs are rejected
pub fn validate_address(address: Option<&str>, address_type: AddressType) -> ApiResult<String> {
    let address = address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::user("Address cannot be empty"))?;

    if address_type == AddressType::FileSystem {
        let pattern = Regex::new(r"^[^:/\s]+:/([^/].*)?$").map_err(|e| ApiError::Internal(e.to_string()))?;
        if !pattern.is_match(address) {
            return Err(ApiError::user("Invalid address"));
        }
    }
    Ok(address.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_system_address_shape() {
        assert_eq!(
            validate_address(Some("host:/data/store"), AddressType::FileSystem).unwrap(),
            "host:/data/store"
        );
        assert!(validate_address(Some("host:/"), AddressType::FileSystem).is_ok());
        for bad in [
            "/data/store",
            "host:data",
            "ho st:/data",
            ":/data",
            "https://dms.example",
            "host://data",
        ] {
            let err = validate_address(Some(bad), AddressType::FileSystem).unwrap_err();
            assert_eq!(err.to_string(), "Invalid address", "{}", bad);
        }
    }

    #[test]
    fn test_other_types_take_any_address() {
        assert!(validate_address(Some("https://example.org/${code}"), AddressType::Url).is_ok());
        assert!(validate_address(Some("anything"), AddressType::Openbis).is_ok());
        let err = validate_address(Some("  "), AddressType::Url).unwrap_err();
        assert_eq!(err.to_string(), "Address cannot be empty");
    }
}
