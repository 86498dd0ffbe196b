//! Delete experiments command
//!
//! Experiments go to the trash together with their samples and data sets.
//! The returned deletion id is `None` when none of the ids resolved.

use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        experiments::resolve,
        shared::{trash, validation::validate_deletion, EntityRef},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteExperimentsCommand {
    pub ids: Option<Vec<EntityRef>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteExperimentsCommand,
) -> ApiResult<Option<i64>> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;

    let mut roots = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(experiment) = resolve(conn, id).await? else {
            continue;
        };
        if !session.has_project_role(experiment.project_id, experiment.space_id, Role::PowerUser) {
            return Err(match id {
                EntityRef::PermId(perm_id) => ApiError::unauthorized("ExperimentPermId", perm_id),
                EntityRef::Identifier(_) => ApiError::unauthorized("ExperimentIdentifier", experiment.identifier()),
            });
        }
        if !roots.contains(&experiment.id) {
            roots.push(experiment.id);
        }
    }

    trash::move_to_trash(conn, session, reason, EntityKind::Experiment, &roots).await
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: DeleteExperimentsCommand,
) -> ApiResult<Option<i64>> {
    access_log::record(
        &session.user_id,
        "delete-experiments",
        &[
            ("EXPERIMENT_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    let deletion_id = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(deletion_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        experiments::commands::create::{self, CreateExperimentsCommand, ExperimentCreation},
        shared::test_helpers::{TestContext, GROUP_OBSERVER, SPACE_USER},
    };

    async fn create_experiment(ctx: &TestContext, project: &str) -> String {
        let admin = ctx.admin().await;
        let command = CreateExperimentsCommand {
            creations: vec![ExperimentCreation::new("SIRNA_HCS", EntityRef::identifier(project), "EXP")],
        };
        create::handle(&ctx.pool, &admin, command).await.unwrap().remove(0)
    }

    fn command(ids: Vec<EntityRef>) -> DeleteExperimentsCommand {
        DeleteExperimentsCommand {
            ids: Some(ids),
            reason: Some("cleanup".into()),
        }
    }

    #[tokio::test]
    async fn test_trash_and_index_removal() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let perm_id = create_experiment(&ctx, "/CISD/NEMO").await;
        ctx.flush_index().await;
        assert!(ctx.index.contains(EntityKind::Experiment, &perm_id).await);

        let deletion_id = handle(&ctx.pool, &admin, command(vec![EntityRef::perm_id(&perm_id)]))
            .await
            .unwrap();
        assert!(deletion_id.is_some());
        assert_eq!(
            ctx.count("SELECT COUNT(*) FROM experiments WHERE deletion_id IS NOT NULL").await,
            1
        );
        ctx.flush_index().await;
        assert!(!ctx.index.contains(EntityKind::Experiment, &perm_id).await);
    }

    #[tokio::test]
    async fn test_empty_and_unknown_ids_are_no_op() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        assert_eq!(handle(&ctx.pool, &admin, command(vec![])).await.unwrap(), None);
        let unknown = command(vec![EntityRef::identifier("/CISD/NEMO/NOPE")]);
        assert_eq!(handle(&ctx.pool, &admin, unknown).await.unwrap(), None);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM deletions").await, 0);
    }

    #[tokio::test]
    async fn test_missing_reason() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let command = DeleteExperimentsCommand {
            ids: Some(vec![]),
            reason: None,
        };
        let err = handle(&ctx.pool, &admin, command).await.unwrap_err();
        assert_eq!(err.to_string(), "Deletion reason cannot be null");
    }

    #[tokio::test]
    async fn test_low_roles_rejected() {
        let ctx = TestContext::new().await;
        create_experiment(&ctx, "/TEST-SPACE/TEST-PROJECT").await;
        create_experiment(&ctx, "/TESTGROUP/TESTPROJ").await;

        let user = ctx.session(SPACE_USER).await;
        let err = handle(&ctx.pool, &user, command(vec![EntityRef::identifier("/TEST-SPACE/TEST-PROJECT/EXP")]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access denied to object with ExperimentIdentifier = [/TEST-SPACE/TEST-PROJECT/EXP]"
        );

        let observer = ctx.session(GROUP_OBSERVER).await;
        let result = handle(&ctx.pool, &observer, command(vec![EntityRef::identifier("/TESTGROUP/TESTPROJ/EXP")])).await;
        assert!(result.is_err());
    }
}
