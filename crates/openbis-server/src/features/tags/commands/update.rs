use chrono::Utc;
use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{
        shared::{updates::present, validation::blank_to_none, EntityRef, ListUpdate, MaterialPermId, TagId},
        tags::{apply_links, data_set_rows, experiment_rows, material_rows, require, sample_rows},
    },
};

/// `description: null` clears the description, an absent field keeps it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagUpdate {
    pub tag_id: TagId,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub experiment_ids: ListUpdate<EntityRef>,
    #[serde(default)]
    pub sample_ids: ListUpdate<EntityRef>,
    #[serde(default)]
    pub data_set_ids: ListUpdate<String>,
    #[serde(default)]
    pub material_ids: ListUpdate<MaterialPermId>,
}

impl TagUpdate {
    pub fn new(tag_id: TagId) -> Self {
        Self {
            tag_id,
            description: None,
            experiment_ids: ListUpdate::default(),
            sample_ids: ListUpdate::default(),
            data_set_ids: ListUpdate::default(),
            material_ids: ListUpdate::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTagsCommand {
    pub updates: Vec<TagUpdate>,
}

async fn experiments(
    conn: &mut SqliteConnection,
    session: &Session,
    update: &ListUpdate<EntityRef>,
) -> ApiResult<(Option<Vec<i64>>, Vec<i64>, Vec<i64>)> {
    let set = match &update.set {
        Some(ids) => Some(experiment_rows(conn, session, ids).await?),
        None => None,
    };
    Ok((
        set,
        experiment_rows(conn, session, &update.add).await?,
        experiment_rows(conn, session, &update.remove).await?,
    ))
}

async fn samples(
    conn: &mut SqliteConnection,
    session: &Session,
    update: &ListUpdate<EntityRef>,
) -> ApiResult<(Option<Vec<i64>>, Vec<i64>, Vec<i64>)> {
    let set = match &update.set {
        Some(ids) => Some(sample_rows(conn, session, ids).await?),
        None => None,
    };
    Ok((
        set,
        sample_rows(conn, session, &update.add).await?,
        sample_rows(conn, session, &update.remove).await?,
    ))
}

async fn data_sets(
    conn: &mut SqliteConnection,
    session: &Session,
    update: &ListUpdate<String>,
) -> ApiResult<(Option<Vec<i64>>, Vec<i64>, Vec<i64>)> {
    let set = match &update.set {
        Some(ids) => Some(data_set_rows(conn, session, ids).await?),
        None => None,
    };
    Ok((
        set,
        data_set_rows(conn, session, &update.add).await?,
        data_set_rows(conn, session, &update.remove).await?,
    ))
}

async fn materials(
    conn: &mut SqliteConnection,
    update: &ListUpdate<MaterialPermId>,
) -> ApiResult<(Option<Vec<i64>>, Vec<i64>, Vec<i64>)> {
    let set = match &update.set {
        Some(ids) => Some(material_rows(conn, ids).await?),
        None => None,
    };
    Ok((
        set,
        material_rows(conn, &update.add).await?,
        material_rows(conn, &update.remove).await?,
    ))
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &UpdateTagsCommand) -> ApiResult<()> {
    for update in &command.updates {
        let tag = require(conn, session, &update.tag_id).await?;
        tag.authorize_change(session)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE tags SET description = ? WHERE id = ?")
                .bind(blank_to_none(description.clone()))
                .bind(tag.id)
                .execute(&mut *conn)
                .await?;
        }

        let mut changes = Vec::new();
        if !update.experiment_ids.is_empty() {
            changes.push((EntityKind::Experiment, experiments(conn, session, &update.experiment_ids).await?));
        }
        if !update.sample_ids.is_empty() {
            changes.push((EntityKind::Sample, samples(conn, session, &update.sample_ids).await?));
        }
        if !update.data_set_ids.is_empty() {
            changes.push((EntityKind::DataSet, data_sets(conn, session, &update.data_set_ids).await?));
        }
        if !update.material_ids.is_empty() {
            changes.push((EntityKind::Material, materials(conn, &update.material_ids).await?));
        }
        for (kind, (set, add, remove)) in changes {
            apply_links(conn, tag.id, kind, set, add, remove).await?;
        }

        sqlx::query("UPDATE tags SET modification_date = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateTagsCommand) -> ApiResult<()> {
    let ids: Vec<&TagId> = command.updates.iter().map(|u| &u.tag_id).collect();
    access_log::record(&session.user_id, "update-tags", &[("TAG_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
