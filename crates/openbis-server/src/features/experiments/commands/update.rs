use chrono::Utc;
use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_project, Session},
    error::{ApiError, ApiResult},
    features::{
        experiments, projects,
        shared::{
            identifiers::experiment_identifier,
            properties::{self, PropertyMap},
            tags, EntityRef, ListUpdate, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentUpdate {
    pub experiment_id: EntityRef,
    /// Move the experiment, with its samples, to another project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityRef>,
    /// Blank values remove a property
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: ListUpdate<TagId>,
}

impl ExperimentUpdate {
    pub fn new(experiment_id: EntityRef) -> Self {
        Self {
            experiment_id,
            project_id: None,
            properties: PropertyMap::new(),
            tag_ids: ListUpdate::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExperimentsCommand {
    pub updates: Vec<ExperimentUpdate>,
}

async fn move_to_project(
    conn: &mut SqliteConnection,
    session: &Session,
    experiment: &experiments::ExperimentRecord,
    target: &EntityRef,
) -> ApiResult<()> {
    let project = projects::require(conn, target).await?;
    if project.id == experiment.project_id {
        return Ok(());
    }
    require_project(session, project.id, project.space_id, &project.identifier(), Role::User)?;

    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM experiments WHERE project_id = ? AND code = ?")
        .bind(project.id)
        .bind(&experiment.code)
        .fetch_one(&mut *conn)
        .await?;
    if taken > 0 {
        return Err(ApiError::user(format!(
            "Experiment '{}' already exists",
            experiment_identifier(&project.space_code, &project.code, &experiment.code)
        )));
    }

    sqlx::query("UPDATE experiments SET project_id = ? WHERE id = ?")
        .bind(project.id)
        .bind(experiment.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "UPDATE samples SET space_id = ?, project_id = CASE WHEN project_id IS NULL THEN NULL ELSE ? END \
         WHERE experiment_id = ?",
    )
    .bind(project.space_id)
    .bind(project.id)
    .bind(experiment.id)
    .execute(&mut *conn)
    .await?;

    let samples: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM samples WHERE experiment_id = ? AND deletion_id IS NULL")
            .bind(experiment.id)
            .fetch_all(&mut *conn)
            .await?;
    outbox::record_rows(conn, EntityKind::Sample, &samples, IndexAction::Upsert).await?;
    let data_sets: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM data_sets WHERE experiment_id = ? AND deletion_id IS NULL")
            .bind(experiment.id)
            .fetch_all(&mut *conn)
            .await?;
    outbox::record_rows(conn, EntityKind::DataSet, &data_sets, IndexAction::Upsert).await?;
    Ok(())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateExperimentsCommand,
) -> ApiResult<()> {
    let now = Utc::now();
    for update in &command.updates {
        let experiment = experiments::require(conn, &update.experiment_id).await?;
        let identifier = experiment.identifier();
        if !session.has_project_role(experiment.project_id, experiment.space_id, Role::User) {
            return Err(ApiError::unauthorized("ExperimentIdentifier", &identifier));
        }

        if let Some(target) = &update.project_id {
            move_to_project(conn, session, &experiment, target).await?;
        }
        properties::store(
            conn,
            EntityKind::Experiment,
            experiment.id,
            experiment.type_id,
            &experiment.type_code,
            &update.properties,
            false,
        )
        .await?;
        tags::apply_update(conn, session, EntityKind::Experiment, experiment.id, &update.tag_ids).await?;

        sqlx::query("UPDATE experiments SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(experiment.id)
            .execute(&mut *conn)
            .await?;
        outbox::record(conn, EntityKind::Experiment, &experiment.perm_id, IndexAction::Upsert).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateExperimentsCommand) -> ApiResult<()> {
    let ids: Vec<&EntityRef> = command.updates.iter().map(|u| &u.experiment_id).collect();
    access_log::record(&session.user_id, "update-experiments", &[("EXPERIMENT_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        experiments::commands::create::{self, CreateExperimentsCommand, ExperimentCreation},
        shared::test_helpers::{TestContext, SPACE_USER},
    };

    async fn create_experiment(ctx: &TestContext, project: &str, code: &str) -> String {
        let admin = ctx.admin().await;
        let mut creation = ExperimentCreation::new("SIRNA_HCS", EntityRef::identifier(project), code);
        creation.properties.insert("DESCRIPTION".into(), "initial".into());
        creation.tag_ids.push(TagId::Code("OLD".into()));
        let command = CreateExperimentsCommand { creations: vec![creation] };
        create::handle(&ctx.pool, &admin, command).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_update_properties_and_tags() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let perm_id = create_experiment(&ctx, "/CISD/NEMO", "EXP").await;

        let mut update = ExperimentUpdate::new(EntityRef::perm_id(&perm_id));
        update.properties.insert("DESCRIPTION".into(), "".into());
        update.properties.insert("SIZE".into(), "42".into());
        update.tag_ids = ListUpdate {
            set: Some(vec![TagId::Code("NEW".into())]),
            ..Default::default()
        };
        handle(&ctx.pool, &admin, UpdateExperimentsCommand { updates: vec![update] })
            .await
            .unwrap();

        let values: Vec<String> = sqlx::query_scalar(
            "SELECT value FROM entity_properties WHERE entity_kind = 'EXPERIMENT' ORDER BY value",
        )
        .fetch_all(&ctx.pool)
        .await
        .unwrap();
        assert_eq!(values, vec!["42"]);
        let tag: String = sqlx::query_scalar(
            "SELECT t.code FROM entity_tags et JOIN tags t ON t.id = et.tag_id WHERE et.entity_kind = 'EXPERIMENT'",
        )
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
        assert_eq!(tag, "NEW");
    }

    #[tokio::test]
    async fn test_move_requires_role_on_target() {
        let ctx = TestContext::new().await;
        create_experiment(&ctx, "/TEST-SPACE/TEST-PROJECT", "EXP").await;
        let user = ctx.session(SPACE_USER).await;

        let mut update = ExperimentUpdate::new(EntityRef::identifier("/TEST-SPACE/TEST-PROJECT/EXP"));
        update.project_id = Some(EntityRef::identifier("/CISD/NEMO"));
        let err = handle(&ctx.pool, &user, UpdateExperimentsCommand { updates: vec![update.clone()] })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with ProjectIdentifier = [/CISD/NEMO]");

        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, UpdateExperimentsCommand { updates: vec![update] })
            .await
            .unwrap();
        let mut conn = ctx.pool.acquire().await.unwrap();
        assert!(experiments::resolve(&mut conn, &EntityRef::identifier("/CISD/NEMO/EXP"))
            .await
            .unwrap()
            .is_some());
    }
}
