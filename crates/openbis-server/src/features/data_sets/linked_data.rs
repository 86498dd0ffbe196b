//! Content copies of LINK data sets
//!
//! Each copy lives in exactly one external data management system, and the
//! system's address type decides the shape of the location:
//!
//! | address type      | external code | path     | git commit hash |
//! |-------------------|---------------|----------|-----------------|
//! | OPENBIS, URL      | required      | absent   | absent          |
//! | FILE_SYSTEM       | absent        | required | optional        |
//!
//! Anything else is rejected with "Invalid arguments". Removed or replaced
//! copies are kept in `content_copy_history` with their validity interval.
//!
//! The legacy `external_code`/`external_dms` pair is derived from the
//! copies: the system is reported iff there is exactly one copy, the code
//! only when that copy is OPENBIS or URL resident.

use chrono::{DateTime, Utc};
use openbis_common::types::AddressType;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::{
    db::push_in,
    error::{ApiError, ApiResult},
    features::{external_dms, shared::validation::blank_to_none},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCopyCreation {
    /// Code of the external data management system
    pub external_dms_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repository_id: Option<String>,
}

impl ContentCopyCreation {
    /// A copy addressed by external code, for OPENBIS and URL systems
    pub fn with_code(external_dms_id: impl Into<String>, external_code: impl Into<String>) -> Self {
        Self {
            external_dms_id: external_dms_id.into(),
            external_code: Some(external_code.into()),
            path: None,
            git_commit_hash: None,
            git_repository_id: None,
        }
    }

    /// A copy addressed by path, for FILE_SYSTEM systems
    pub fn with_path(external_dms_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            external_dms_id: external_dms_id.into(),
            external_code: None,
            path: Some(path.into()),
            git_commit_hash: None,
            git_repository_id: None,
        }
    }
}

crate::struct_log_repr!(
    ContentCopyCreation,
    "ContentCopyCreation",
    "externalDmsId" => external_dms_id,
    "externalCode" => external_code,
    "path" => path,
    "gitCommitHash" => git_commit_hash
);

/// Linked data given when a LINK data set is registered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedDataCreation {
    pub content_copies: Vec<ContentCopyCreation>,
    /// Legacy single-copy form, used when `content_copies` is empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_dms_id: Option<String>,
}

impl LinkedDataCreation {
    fn copies(&self) -> ApiResult<Vec<ContentCopyCreation>> {
        let legacy = self.external_code.is_some() || self.external_dms_id.is_some();
        match (legacy, self.content_copies.is_empty()) {
            (false, _) => Ok(self.content_copies.clone()),
            (true, true) => {
                let dms = self.external_dms_id.clone().ok_or_else(invalid_arguments)?;
                Ok(vec![ContentCopyCreation {
                    external_dms_id: dms,
                    external_code: self.external_code.clone(),
                    path: None,
                    git_commit_hash: None,
                    git_repository_id: None,
                }])
            },
            (true, false) => Err(invalid_arguments()),
        }
    }
}

/// Content copies to add, and ids of copies to remove
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCopyListUpdate {
    pub add: Vec<ContentCopyCreation>,
    pub remove: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedDataUpdate {
    /// Legacy: replace the sole content copy with one carrying this code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_code: Option<String>,
    /// Legacy: replace the sole content copy with one in this system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_dms_id: Option<String>,
    pub content_copies: ContentCopyListUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCopy {
    pub id: i64,
    pub external_dms: String,
    pub address_type: AddressType,
    pub external_code: Option<String>,
    pub path: Option<String>,
    pub git_commit_hash: Option<String>,
    pub git_repository_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedData {
    pub external_code: Option<String>,
    pub external_dms: Option<String>,
    pub content_copies: Vec<ContentCopy>,
}

impl LinkedData {
    pub fn from_copies(content_copies: Vec<ContentCopy>) -> Self {
        let (external_dms, external_code) = match content_copies.as_slice() {
            [only] => {
                let code = match only.address_type {
                    AddressType::Openbis | AddressType::Url => only.external_code.clone(),
                    AddressType::FileSystem => None,
                };
                (Some(only.external_dms.clone()), code)
            },
            _ => (None, None),
        };
        Self {
            external_code,
            external_dms,
            content_copies,
        }
    }
}

/// A superseded content copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ContentCopyHistoryEntry {
    #[serde(skip)]
    pub data_set_id: i64,
    pub external_dms: String,
    pub external_code: Option<String>,
    pub path: Option<String>,
    pub git_commit_hash: Option<String>,
    pub git_repository_id: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ContentCopyRow {
    pub id: i64,
    pub data_set_id: i64,
    pub external_dms_id: i64,
    pub external_dms_code: String,
    pub address_type: String,
    pub external_code: Option<String>,
    pub path: Option<String>,
    pub git_commit_hash: Option<String>,
    pub git_repository_id: Option<String>,
    pub valid_from: DateTime<Utc>,
}

impl ContentCopyRow {
    fn into_copy(self) -> ApiResult<ContentCopy> {
        Ok(ContentCopy {
            id: self.id,
            address_type: self.address_type.parse()?,
            external_dms: self.external_dms_code,
            external_code: self.external_code,
            path: self.path,
            git_commit_hash: self.git_commit_hash,
            git_repository_id: self.git_repository_id,
        })
    }
}

fn invalid_arguments() -> ApiError {
    ApiError::user("Invalid arguments")
}

/// Check a location against the address type table
pub fn validate_location(
    address_type: AddressType,
    external_code: Option<&str>,
    path: Option<&str>,
    git_commit_hash: Option<&str>,
) -> ApiResult<()> {
    let valid = match address_type {
        AddressType::Openbis | AddressType::Url => {
            external_code.is_some() && path.is_none() && git_commit_hash.is_none()
        },
        AddressType::FileSystem => path.is_some() && external_code.is_none(),
    };
    if valid {
        Ok(())
    } else {
        Err(invalid_arguments())
    }
}

const COPY_SELECT: &str = r#"
    SELECT c.id, c.data_set_id, c.external_dms_id, x.code AS external_dms_code, x.address_type,
           c.external_code, c.path, c.git_commit_hash, c.git_repository_id, c.valid_from
    FROM content_copies c
    JOIN external_dms x ON x.id = c.external_dms_id
"#;

pub(crate) async fn copies_of(conn: &mut SqliteConnection, data_set_id: i64) -> ApiResult<Vec<ContentCopyRow>> {
    let rows = sqlx::query_as::<_, ContentCopyRow>(&format!("{} WHERE c.data_set_id = ? ORDER BY c.id", COPY_SELECT))
        .bind(data_set_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

async fn insert_copy(
    conn: &mut SqliteConnection,
    data_set_id: i64,
    creation: &ContentCopyCreation,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    let dms = external_dms::require(conn, &creation.external_dms_id).await?;
    let external_code = blank_to_none(creation.external_code.clone());
    let path = blank_to_none(creation.path.clone());
    let git_commit_hash = blank_to_none(creation.git_commit_hash.clone());
    validate_location(
        dms.address_type()?,
        external_code.as_deref(),
        path.as_deref(),
        git_commit_hash.as_deref(),
    )?;

    sqlx::query(
        r#"
        INSERT INTO content_copies (data_set_id, external_dms_id, external_code, path, git_commit_hash,
                                    git_repository_id, valid_from)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(data_set_id)
    .bind(dms.id)
    .bind(external_code)
    .bind(path)
    .bind(git_commit_hash)
    .bind(blank_to_none(creation.git_repository_id.clone()))
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Drop a copy, keeping it in the history
async fn retire_copy(conn: &mut SqliteConnection, copy: &ContentCopyRow, now: DateTime<Utc>) -> ApiResult<()> {
    sqlx::query(
        r#"
        INSERT INTO content_copy_history (data_set_id, external_dms_id, external_code, path,
                                          git_commit_hash, git_repository_id, valid_from, valid_until)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(copy.data_set_id)
    .bind(copy.external_dms_id)
    .bind(&copy.external_code)
    .bind(&copy.path)
    .bind(&copy.git_commit_hash)
    .bind(&copy.git_repository_id)
    .bind(copy.valid_from)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM content_copies WHERE id = ?")
        .bind(copy.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Register the copies of a new LINK data set
pub(crate) async fn create(
    conn: &mut SqliteConnection,
    data_set_id: i64,
    linked_data: &LinkedDataCreation,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    for copy in linked_data.copies()? {
        insert_copy(conn, data_set_id, &copy, now).await?;
    }
    Ok(())
}

/// Replace the sole copy through the legacy fields.
///
/// Setting the values the copy already has changes nothing.
async fn replace_legacy(
    conn: &mut SqliteConnection,
    data_set_id: i64,
    update: &LinkedDataUpdate,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    let current = copies_of(conn, data_set_id).await?;
    if current.len() > 1 {
        return Err(ApiError::user(
            "External code cannot be set on a data set with more than one content copy",
        ));
    }
    let existing = current.first();

    let dms_code = match (&update.external_dms_id, existing) {
        (Some(code), _) => code.trim().to_uppercase(),
        (None, Some(copy)) => copy.external_dms_code.clone(),
        (None, None) => return Err(invalid_arguments()),
    };
    let external_code = match (&update.external_code, existing) {
        (Some(code), _) => blank_to_none(Some(code.clone())),
        (None, Some(copy)) => copy.external_code.clone(),
        (None, None) => None,
    };

    if let Some(copy) = existing {
        let unchanged = copy.external_dms_code == dms_code
            && copy.external_code == external_code
            && copy.path.is_none()
            && copy.git_commit_hash.is_none();
        if unchanged {
            return Ok(());
        }
    }

    let replacement = ContentCopyCreation {
        external_dms_id: dms_code,
        external_code,
        path: None,
        git_commit_hash: None,
        git_repository_id: None,
    };
    if let Some(copy) = existing {
        retire_copy(conn, copy, now).await?;
    }
    insert_copy(conn, data_set_id, &replacement, now).await
}

/// Apply a linked data update to a LINK data set
pub(crate) async fn update(
    conn: &mut SqliteConnection,
    data_set_id: i64,
    update: &LinkedDataUpdate,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    if update.external_code.is_some() || update.external_dms_id.is_some() {
        replace_legacy(conn, data_set_id, update, now).await?;
    }

    if !update.content_copies.remove.is_empty() {
        for copy in copies_of(conn, data_set_id).await? {
            if update.content_copies.remove.contains(&copy.id) {
                retire_copy(conn, &copy, now).await?;
            }
        }
    }
    for copy in &update.content_copies.add {
        insert_copy(conn, data_set_id, copy, now).await?;
    }
    Ok(())
}

/// Content copies of the given data sets, in registration order
pub(crate) async fn load(
    conn: &mut SqliteConnection,
    data_set_ids: &[i64],
) -> ApiResult<HashMap<i64, Vec<ContentCopy>>> {
    let mut result: HashMap<i64, Vec<ContentCopy>> = HashMap::new();
    if data_set_ids.is_empty() {
        return Ok(result);
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(COPY_SELECT);
    builder.push(" WHERE ");
    push_in(&mut builder, "c.data_set_id", data_set_ids);
    builder.push(" ORDER BY c.id");
    for row in builder.build_query_as::<ContentCopyRow>().fetch_all(&mut *conn).await? {
        result.entry(row.data_set_id).or_default().push(row.into_copy()?);
    }
    Ok(result)
}

/// Superseded copies of the given data sets, oldest first
pub(crate) async fn history(
    conn: &mut SqliteConnection,
    data_set_ids: &[i64],
) -> ApiResult<HashMap<i64, Vec<ContentCopyHistoryEntry>>> {
    let mut result: HashMap<i64, Vec<ContentCopyHistoryEntry>> = HashMap::new();
    if data_set_ids.is_empty() {
        return Ok(result);
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT h.data_set_id, x.code AS external_dms, h.external_code, h.path, h.git_commit_hash,
               h.git_repository_id, h.valid_from, h.valid_until
        FROM content_copy_history h
        JOIN external_dms x ON x.id = h.external_dms_id
        WHERE "#,
    );
    push_in(&mut builder, "h.data_set_id", data_set_ids);
    builder.push(" ORDER BY h.id");
    for row in builder
        .build_query_as::<ContentCopyHistoryEntry>()
        .fetch_all(&mut *conn)
        .await?
    {
        result.entry(row.data_set_id).or_default().push(row);
    }
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_location_table() {
        use AddressType::*;
        let cases: &[(AddressType, Option<&str>, Option<&str>, Option<&str>, bool)] = &[
            (Openbis, Some("CODE"), None, None, true),
            (Url, Some("CODE"), None, None, true),
            (Openbis, None, None, None, false),
            (Url, Some("CODE"), Some("/path"), None, false),
            (Openbis, Some("CODE"), None, Some("abc123"), false),
            (FileSystem, None, Some("/path"), None, true),
            (FileSystem, None, Some("/path"), Some("abc123"), true),
            (FileSystem, Some("CODE"), Some("/path"), None, false),
            (FileSystem, None, None, None, false),
            (FileSystem, None, None, Some("abc123"), false),
        ];
        for (address_type, code, path, hash, valid) in cases {
            let result = validate_location(*address_type, *code, *path, *hash);
            assert_eq!(result.is_ok(), *valid, "{:?} {:?} {:?} {:?}", address_type, code, path, hash);
            if let Err(err) = result {
                assert_eq!(err.to_string(), "Invalid arguments");
            }
        }
    }

    fn copy(id: i64, address_type: AddressType) -> ContentCopy {
        ContentCopy {
            id,
            external_dms: format!("DMS_{}", id),
            address_type,
            external_code: Some("EXT".into()),
            path: None,
            git_commit_hash: None,
            git_repository_id: None,
        }
    }

    #[test]
    fn test_legacy_fields_derived_from_copies() {
        let single = LinkedData::from_copies(vec![copy(1, AddressType::Url)]);
        assert_eq!(single.external_dms.as_deref(), Some("DMS_1"));
        assert_eq!(single.external_code.as_deref(), Some("EXT"));

        let file_system = LinkedData::from_copies(vec![copy(1, AddressType::FileSystem)]);
        assert_eq!(file_system.external_dms.as_deref(), Some("DMS_1"));
        assert_eq!(file_system.external_code, None);

        let two = LinkedData::from_copies(vec![copy(1, AddressType::Url), copy(2, AddressType::Url)]);
        assert_eq!(two.external_dms, None);
        assert_eq!(two.external_code, None);
    }

    #[test]
    fn test_legacy_creation_needs_a_system() {
        let creation = LinkedDataCreation {
            external_code: Some("EXT".into()),
            ..Default::default()
        };
        assert_eq!(creation.copies().unwrap_err().to_string(), "Invalid arguments");

        let creation = LinkedDataCreation {
            external_code: Some("EXT".into()),
            external_dms_id: Some("DMS".into()),
            ..Default::default()
        };
        assert_eq!(creation.copies().unwrap(), vec![ContentCopyCreation::with_code("DMS", "EXT")]);
    }
}
