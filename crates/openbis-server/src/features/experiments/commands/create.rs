use chrono::Utc;
use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_project, Session},
    db::next_perm_id,
    error::{ApiError, ApiResult},
    features::{
        entity_types::require_type,
        projects,
        shared::{
            identifiers::experiment_identifier,
            properties::{self, PropertyMap},
            tags,
            validation::validate_code,
            EntityRef, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentCreation {
    /// Experiment type code
    pub type_id: String,
    pub project_id: EntityRef,
    pub code: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

impl ExperimentCreation {
    pub fn new(type_id: impl Into<String>, project_id: EntityRef, code: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            project_id,
            code: code.into(),
            properties: PropertyMap::new(),
            tag_ids: Vec::new(),
        }
    }
}

crate::struct_log_repr!(
    ExperimentCreation,
    "ExperimentCreation",
    "projectId" => project_id,
    "code" => code,
    "typeId" => type_id
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateExperimentsCommand {
    pub creations: Vec<ExperimentCreation>,
}

/// Insert the experiments, returning their perm ids
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateExperimentsCommand,
) -> ApiResult<Vec<String>> {
    let now = Utc::now();
    let mut perm_ids = Vec::with_capacity(command.creations.len());

    for creation in &command.creations {
        let code = validate_code(&creation.code, "Experiment")?;
        let project = projects::require(conn, &creation.project_id).await?;
        let project_identifier = project.identifier();
        require_project(session, project.id, project.space_id, &project_identifier, Role::User)?;
        let entity_type = require_type(conn, EntityKind::Experiment, &creation.type_id).await?;

        let identifier = experiment_identifier(&project.space_code, &project.code, &code);
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM experiments WHERE project_id = ? AND code = ?")
            .bind(project.id)
            .bind(&code)
            .fetch_one(&mut *conn)
            .await?;
        if taken > 0 {
            return Err(ApiError::user(format!("Experiment '{}' already exists", identifier)));
        }

        let perm_id = next_perm_id(conn).await?;
        let id = sqlx::query(
            r#"
            INSERT INTO experiments (perm_id, code, type_id, project_id, registrator_id,
                                     registration_date, modification_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&perm_id)
        .bind(&code)
        .bind(entity_type.id)
        .bind(project.id)
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        properties::store(
            conn,
            EntityKind::Experiment,
            id,
            entity_type.id,
            &entity_type.code,
            &creation.properties,
            true,
        )
        .await?;
        let tag_ids = tags::resolve_or_create(conn, session, &creation.tag_ids).await?;
        tags::link(conn, EntityKind::Experiment, id, &tag_ids).await?;

        outbox::record(conn, EntityKind::Experiment, &perm_id, IndexAction::Upsert).await?;
        tracing::debug!(experiment = %identifier, perm_id = %perm_id, "Experiment registered");
        perm_ids.push(perm_id);
    }
    Ok(perm_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateExperimentsCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        "create-experiments",
        &[("NEW_EXPERIMENTS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let perm_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(perm_ids)
}
