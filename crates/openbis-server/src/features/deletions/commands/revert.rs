//! Revert deletions command
//!
//! Brings the parked objects back and drops the deletions.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{deletions, shared::trash},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevertDeletionsCommand {
    pub ids: Option<Vec<i64>>,
}

/// Returns the number of restored objects
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &RevertDeletionsCommand,
) -> ApiResult<usize> {
    let ids = command
        .ids
        .as_deref()
        .ok_or_else(|| ApiError::user("Deletion ids cannot be null"))?;

    let mut restored = 0;
    for id in ids {
        let Some(deletion) = deletions::resolve(conn, *id).await? else {
            continue;
        };
        deletion.authorize(session)?;
        restored += trash::revert(conn, deletion.id).await?;
        tracing::info!(deletion_id = deletion.id, "Deletion reverted");
    }
    Ok(restored)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: RevertDeletionsCommand) -> ApiResult<usize> {
    access_log::record(
        &session.user_id,
        "revert-deletions",
        &[("DELETION_IDS", command.ids.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let restored = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(restored)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        experiments::commands::{
            create::{self as create_experiments, CreateExperimentsCommand, ExperimentCreation},
            delete::{self as delete_experiments, DeleteExperimentsCommand},
        },
        samples::commands::create::{self as create_samples, CreateSamplesCommand, SampleCreation},
        shared::{test_helpers::TestContext, EntityRef},
    };
    use openbis_common::types::EntityKind;

    #[tokio::test]
    async fn test_revert_restores_the_whole_cascade() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create_experiments::handle(
            &ctx.pool,
            &admin,
            CreateExperimentsCommand {
                creations: vec![ExperimentCreation::new(
                    "SIRNA_HCS",
                    EntityRef::identifier("/CISD/NEMO"),
                    "EXP-R",
                )],
            },
        )
        .await
        .unwrap();
        let sample = SampleCreation {
            experiment_id: Some(EntityRef::identifier("/CISD/NEMO/EXP-R")),
            ..SampleCreation::new("CELL_PLATE", Some("CISD"), Some("PLATE-R"))
        };
        let sample_perm_id = create_samples::handle(&ctx.pool, &admin, CreateSamplesCommand { creations: vec![sample] })
            .await
            .unwrap()
            .remove(0);

        let deletion_id = delete_experiments::handle(
            &ctx.pool,
            &admin,
            DeleteExperimentsCommand {
                ids: Some(vec![EntityRef::identifier("/CISD/NEMO/EXP-R")]),
                reason: Some("oops".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            ctx.count("SELECT COUNT(*) FROM samples WHERE deletion_id IS NOT NULL").await,
            1
        );

        let restored = handle(&ctx.pool, &admin, RevertDeletionsCommand { ids: Some(vec![deletion_id]) })
            .await
            .unwrap();
        assert_eq!(restored, 2);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM samples WHERE deletion_id IS NOT NULL").await, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM deletions").await, 0);

        ctx.flush_index().await;
        assert!(ctx.index.contains(EntityKind::Sample, &sample_perm_id).await);
    }

    #[tokio::test]
    async fn test_null_ids_rejected_empty_ids_noop() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle(&ctx.pool, &admin, RevertDeletionsCommand { ids: None }).await.unwrap_err();
        assert_eq!(err.to_string(), "Deletion ids cannot be null");
        assert_eq!(
            handle(&ctx.pool, &admin, RevertDeletionsCommand { ids: Some(vec![]) })
                .await
                .unwrap(),
            0
        );
    }
}
