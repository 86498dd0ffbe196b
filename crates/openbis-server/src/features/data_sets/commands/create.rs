//! Create data sets command
//!
//! Codes are optional; a missing code is replaced by a fresh perm id.

use chrono::{DateTime, Utc};
use openbis_common::types::{DataSetKind, EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{check_kind_payload, resolve_owner, Owner};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    db::next_perm_id,
    error::{ApiError, ApiResult},
    features::{
        data_sets::{
            self,
            linked_data::{self, LinkedDataCreation},
            relationships::{self, Link},
        },
        entity_types::{require_type, TypeRecord},
        shared::{
            properties::{self, PropertyMap},
            tags,
            validation::{blank_to_none, require_non_empty, validate_code},
            EntityRef, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDataCreation {
    /// Location relative to the store share
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetCreation {
    /// Data set type code
    pub type_id: String,
    pub kind: DataSetKind,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<EntityRef>,
    #[serde(default)]
    pub sample_id: Option<EntityRef>,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    /// Codes of parent data sets
    #[serde(default)]
    pub parent_ids: Vec<String>,
    /// Codes of component data sets, for CONTAINER data sets
    #[serde(default)]
    pub component_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_data: Option<PhysicalDataCreation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_data: Option<LinkedDataCreation>,
}

impl DataSetCreation {
    pub fn new(type_id: impl Into<String>, kind: DataSetKind, code: Option<&str>) -> Self {
        Self {
            type_id: type_id.into(),
            kind,
            code: code.map(str::to_string),
            experiment_id: None,
            sample_id: None,
            properties: PropertyMap::new(),
            tag_ids: Vec::new(),
            parent_ids: Vec::new(),
            component_ids: Vec::new(),
            physical_data: None,
            linked_data: None,
        }
    }
}

crate::struct_log_repr!(
    DataSetCreation,
    "DataSetCreation",
    "code" => code,
    "typeId" => type_id,
    "kind" => kind,
    "experimentId" => experiment_id,
    "sampleId" => sample_id
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDataSetsCommand {
    pub creations: Vec<DataSetCreation>,
}

async fn data_set_code(conn: &mut SqliteConnection, creation: &DataSetCreation) -> ApiResult<String> {
    let code = match creation.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => validate_code(code, "Data set")?,
        None => next_perm_id(conn).await?,
    };
    // Codes stay taken while a data set sits in the trash
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data_sets WHERE code = ?")
        .bind(&code)
        .fetch_one(&mut *conn)
        .await?;
    if taken > 0 {
        return Err(ApiError::user(format!("Data set '{}' already exists", code)));
    }
    Ok(code)
}

async fn insert(
    conn: &mut SqliteConnection,
    session: &Session,
    code: &str,
    creation: &DataSetCreation,
    entity_type: &TypeRecord,
    owner: &Owner,
    now: DateTime<Utc>,
) -> ApiResult<i64> {
    let (location, share_id, size) = match &creation.physical_data {
        Some(physical) => (
            Some(require_non_empty(Some(physical.location.as_str()), "Location")?.to_string()),
            blank_to_none(physical.share_id.clone()),
            physical.size,
        ),
        None => (None, None, None),
    };
    let id = sqlx::query(
        r#"
        INSERT INTO data_sets (code, type_id, kind, experiment_id, sample_id, location, share_id, size,
                               registrator_id, registration_date, modification_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(code)
    .bind(entity_type.id)
    .bind(creation.kind.as_str())
    .bind(owner.experiment_id)
    .bind(owner.sample_id)
    .bind(location)
    .bind(share_id)
    .bind(size)
    .bind(session.person_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Insert the data sets, returning their codes
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateDataSetsCommand,
) -> ApiResult<Vec<String>> {
    let now = Utc::now();
    let mut codes = Vec::with_capacity(command.creations.len());

    for creation in &command.creations {
        let owner = resolve_owner(conn, creation.experiment_id.as_ref(), creation.sample_id.as_ref()).await?;
        owner.authorize(session, Role::User)?;
        let entity_type = require_type(conn, EntityKind::DataSet, &creation.type_id).await?;
        let code = data_set_code(conn, creation).await?;

        check_kind_payload(
            &code,
            creation.kind,
            creation.physical_data.is_some(),
            creation.linked_data.is_some(),
        )?;
        match creation.kind {
            DataSetKind::Physical if creation.physical_data.is_none() => {
                return Err(ApiError::user(format!("Physical data cannot be empty for data set '{}'", code)));
            },
            DataSetKind::Link if creation.linked_data.is_none() => {
                return Err(ApiError::user(format!("Linked data cannot be empty for data set '{}'", code)));
            },
            _ => {},
        }

        let id = insert(conn, session, &code, creation, &entity_type, &owner, now).await?;
        if let Some(linked) = &creation.linked_data {
            linked_data::create(conn, id, linked, now).await?;
        }
        properties::store(
            conn,
            EntityKind::DataSet,
            id,
            entity_type.id,
            &entity_type.code,
            &creation.properties,
            true,
        )
        .await?;
        let tag_ids = tags::resolve_or_create(conn, session, &creation.tag_ids).await?;
        tags::link(conn, EntityKind::DataSet, id, &tag_ids).await?;

        let data_set = data_sets::require(conn, &code).await?;
        for parent in data_sets::require_all(conn, &creation.parent_ids).await? {
            relationships::connect(conn, Link::Lineage, &parent, &data_set).await?;
        }
        for component in data_sets::require_all(conn, &creation.component_ids).await? {
            relationships::connect(conn, Link::Containment, &data_set, &component).await?;
        }

        outbox::record(conn, EntityKind::DataSet, &code, IndexAction::Upsert).await?;
        tracing::debug!(data_set = %code, kind = %creation.kind, "Data set registered");
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: CreateDataSetsCommand) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-data-sets", &[("NEW_DATA_SETS", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let codes = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(codes)
}
