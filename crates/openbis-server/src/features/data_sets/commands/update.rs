//! Update data sets command
//!
//! A data set can be moved to another experiment or sample, relinked to
//! parents, children, containers and components, and have its physical or
//! linked data changed according to its kind.

use chrono::Utc;
use openbis_common::types::{DataSetKind, EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::{check_kind_payload, resolve_owner};
use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        data_sets::{
            self,
            linked_data::{self, LinkedDataUpdate},
            relationships::{self, Link, Side},
            DataSetRecord,
        },
        shared::{
            properties::{self, PropertyMap},
            tags,
            updates::present,
            validation::blank_to_none,
            EntityRef, ListUpdate, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalDataUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetUpdate {
    /// Data set code
    pub data_set_id: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<Option<EntityRef>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<Option<EntityRef>>,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: ListUpdate<TagId>,
    #[serde(default)]
    pub parent_ids: ListUpdate<String>,
    #[serde(default)]
    pub child_ids: ListUpdate<String>,
    #[serde(default)]
    pub container_ids: ListUpdate<String>,
    #[serde(default)]
    pub component_ids: ListUpdate<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_data: Option<PhysicalDataUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_data: Option<LinkedDataUpdate>,
}

impl DataSetUpdate {
    pub fn new(data_set_id: impl Into<String>) -> Self {
        Self {
            data_set_id: data_set_id.into(),
            experiment_id: None,
            sample_id: None,
            properties: PropertyMap::new(),
            tag_ids: ListUpdate::default(),
            parent_ids: ListUpdate::default(),
            child_ids: ListUpdate::default(),
            container_ids: ListUpdate::default(),
            component_ids: ListUpdate::default(),
            physical_data: None,
            linked_data: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDataSetsCommand {
    pub updates: Vec<DataSetUpdate>,
}

async fn perm_id_ref(conn: &mut SqliteConnection, table: &str, id: Option<i64>) -> ApiResult<Option<EntityRef>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let perm_id: String = sqlx::query_scalar(&format!("SELECT perm_id FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(Some(EntityRef::PermId(perm_id)))
}

async fn relocate(
    conn: &mut SqliteConnection,
    session: &Session,
    data_set: &DataSetRecord,
    update: &DataSetUpdate,
) -> ApiResult<()> {
    let sample = match &update.sample_id {
        Some(sample) => sample.clone(),
        None => perm_id_ref(conn, "samples", data_set.sample_id).await?,
    };
    // A new sample brings its own experiment unless one is named
    let experiment = match (&update.experiment_id, &update.sample_id) {
        (Some(experiment), _) => experiment.clone(),
        (None, Some(_)) => None,
        (None, None) => perm_id_ref(conn, "experiments", data_set.experiment_id).await?,
    };

    let owner = resolve_owner(conn, experiment.as_ref(), sample.as_ref()).await?;
    if owner.experiment_id == data_set.experiment_id && owner.sample_id == data_set.sample_id {
        return Ok(());
    }
    owner.authorize(session, Role::User)?;

    sqlx::query("UPDATE data_sets SET experiment_id = ?, sample_id = ? WHERE id = ?")
        .bind(owner.experiment_id)
        .bind(owner.sample_id)
        .bind(data_set.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn update_physical(
    conn: &mut SqliteConnection,
    data_set: &DataSetRecord,
    update: &PhysicalDataUpdate,
) -> ApiResult<()> {
    if let Some(share_id) = &update.share_id {
        sqlx::query("UPDATE data_sets SET share_id = ? WHERE id = ?")
            .bind(blank_to_none(Some(share_id.clone())))
            .bind(data_set.id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(size) = update.size {
        if size < 0 {
            return Err(ApiError::user(format!("Size of data set '{}' cannot be negative", data_set.code)));
        }
        sqlx::query("UPDATE data_sets SET size = ? WHERE id = ?")
            .bind(size)
            .bind(data_set.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateDataSetsCommand,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let data_set = data_sets::require(conn, &update.data_set_id).await?;
        data_set.authorize(session, Role::User)?;
        let kind = data_set.kind()?;
        check_kind_payload(
            &data_set.code,
            kind,
            update.physical_data.is_some(),
            update.linked_data.is_some(),
        )?;

        if update.experiment_id.is_some() || update.sample_id.is_some() {
            relocate(conn, session, &data_set, update).await?;
        }
        properties::store(
            conn,
            EntityKind::DataSet,
            data_set.id,
            data_set.type_id,
            &data_set.type_code,
            &update.properties,
            false,
        )
        .await?;
        tags::apply_update(conn, session, EntityKind::DataSet, data_set.id, &update.tag_ids).await?;

        relationships::relink(conn, Link::Lineage, &data_set, Side::Lower, &update.parent_ids).await?;
        relationships::relink(conn, Link::Lineage, &data_set, Side::Upper, &update.child_ids).await?;
        relationships::relink(conn, Link::Containment, &data_set, Side::Lower, &update.container_ids).await?;
        if !update.component_ids.is_empty() && kind != DataSetKind::Container {
            return Err(ApiError::user(format!(
                "Data set '{}' is not a container data set",
                data_set.code
            )));
        }
        relationships::relink(conn, Link::Containment, &data_set, Side::Upper, &update.component_ids).await?;

        if let Some(physical) = &update.physical_data {
            update_physical(conn, &data_set, physical).await?;
        }
        if let Some(linked) = &update.linked_data {
            linked_data::update(conn, data_set.id, linked, now).await?;
        }

        sqlx::query("UPDATE data_sets SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(data_set.id)
            .execute(&mut *conn)
            .await?;
        outbox::record(conn, EntityKind::DataSet, &data_set.code, IndexAction::Upsert).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateDataSetsCommand) -> ApiResult<()> {
    let ids: Vec<&String> = command.updates.iter().map(|u| &u.data_set_id).collect();
    access_log::record(&session.user_id, "update-data-sets", &[("DATA_SET_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
