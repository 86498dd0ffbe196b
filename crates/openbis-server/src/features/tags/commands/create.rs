//! Create tags command
//!
//! Tags are always created for the caller. Linked entities must exist and be
//! readable by the caller.

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
        shared::{
            error_helpers::map_unique_violation,
            ids::tag_perm_id,
            tags::link,
            validation::{blank_to_none, require_non_empty, validate_code},
            EntityRef, MaterialPermId,
        },
        tags::{data_set_rows, experiment_rows, material_rows, sample_rows},
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagCreation {
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub experiment_ids: Vec<EntityRef>,
    pub sample_ids: Vec<EntityRef>,
    pub data_set_ids: Vec<String>,
    pub material_ids: Vec<MaterialPermId>,
}

impl TagCreation {
    pub fn new(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            ..Self::default()
        }
    }
}

crate::struct_log_repr!(TagCreation, "TagCreation", "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTagsCommand {
    pub creations: Vec<TagCreation>,
}

/// Insert the tags, returning their `/owner/CODE` perm ids
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateTagsCommand,
) -> ApiResult<Vec<String>> {
    let mut perm_ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_code(require_non_empty(creation.code.as_deref(), "Code")?, "Tag")?;
        let perm_id = tag_perm_id(&session.user_id, &code);

        let now = Utc::now();
        let tag_id = sqlx::query(
            "INSERT INTO tags (code, description, owner_id, registration_date, modification_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&code)
        .bind(blank_to_none(creation.description.clone()))
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Tag '{}' already exists", perm_id)))?
        .last_insert_rowid();

        let links = [
            (EntityKind::Experiment, experiment_rows(conn, session, &creation.experiment_ids).await?),
            (EntityKind::Sample, sample_rows(conn, session, &creation.sample_ids).await?),
            (EntityKind::DataSet, data_set_rows(conn, session, &creation.data_set_ids).await?),
            (EntityKind::Material, material_rows(conn, &creation.material_ids).await?),
        ];
        for (kind, entity_ids) in links {
            for entity_id in entity_ids {
                link(conn, kind, entity_id, &[tag_id]).await?;
            }
        }
        perm_ids.push(perm_id);
    }
    Ok(perm_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: CreateTagsCommand) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        "create-tags",
        &[("NEW_TAGS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let perm_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(perm_ids)
}
