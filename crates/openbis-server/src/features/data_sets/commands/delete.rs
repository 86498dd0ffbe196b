//! Delete data sets command
//!
//! Data sets go to the trash with their components. Types flagged with
//! `disallow_deletion` block the whole request.

use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::ApiResult,
    features::{
        data_sets,
        shared::{trash, validation::validate_deletion},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteDataSetsCommand {
    /// Data set codes
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteDataSetsCommand,
) -> ApiResult<Option<i64>> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;

    let mut roots = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(data_set) = data_sets::resolve(conn, id).await? else {
            continue;
        };
        data_set.authorize(session, Role::PowerUser)?;
        if !roots.contains(&data_set.id) {
            roots.push(data_set.id);
        }
    }

    trash::move_to_trash(conn, session, reason, EntityKind::DataSet, &roots).await
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteDataSetsCommand) -> ApiResult<Option<i64>> {
    access_log::record(
        &session.user_id,
        "delete-data-sets",
        &[
            ("DATA_SET_IDS", command.ids.log_repr()),
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
        data_sets::{
            commands::create::{
                self,
                tests::{owners, physical},
                CreateDataSetsCommand,
            },
            DataSetCreation,
        },
        shared::{
            test_helpers::{TestContext, GROUP_POWER_USER},
            EntityRef,
        },
    };
    use openbis_common::types::DataSetKind;

    fn command(ids: &[&str]) -> DeleteDataSetsCommand {
        DeleteDataSetsCommand {
            ids: Some(ids.iter().map(|id| id.to_string()).collect()),
            reason: Some("cleanup".into()),
        }
    }

    #[tokio::test]
    async fn test_container_takes_components_along() {
        let ctx = TestContext::new().await;
        owners(&ctx).await;
        let admin = ctx.admin().await;
        let mut container = DataSetCreation::new("HCS_IMAGE", DataSetKind::Container, Some("BOX"));
        container.experiment_id = Some(EntityRef::identifier("/CISD/NEMO/EXP"));
        container.component_ids.push("PART".into());
        let creations = vec![physical("PART"), container, physical("KEEP")];
        create::handle(&ctx.pool, &admin, CreateDataSetsCommand { creations })
            .await
            .unwrap();

        let deletion = handle(&ctx.pool, &admin, command(&["BOX", "MISSING"])).await.unwrap();
        assert!(deletion.is_some());
        assert_eq!(ctx.count("SELECT COUNT(*) FROM data_sets WHERE deletion_id IS NULL").await, 1);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM deleted_objects").await, 2);
    }

    #[tokio::test]
    async fn test_disallowed_type_blocks_deletion() {
        let ctx = TestContext::new().await;
        owners(&ctx).await;
        let admin = ctx.admin().await;
        create::handle(&ctx.pool, &admin, CreateDataSetsCommand { creations: vec![physical("DS")] })
            .await
            .unwrap();
        sqlx::query("UPDATE entity_types SET attributes = '{\"disallow_deletion\":true}' WHERE code = 'HCS_IMAGE'")
            .execute(&ctx.pool)
            .await
            .unwrap();

        let err = handle(&ctx.pool, &admin, command(&["DS"])).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Deletion failed because the following data sets have 'Disallow deletion' flag set to true in their type: [DS (HCS_IMAGE)]"
        );
        assert_eq!(ctx.count("SELECT COUNT(*) FROM deletions").await, 0);
    }

    #[tokio::test]
    async fn test_empty_and_unauthorized() {
        let ctx = TestContext::new().await;
        owners(&ctx).await;
        let admin = ctx.admin().await;
        assert_eq!(handle(&ctx.pool, &admin, command(&[])).await.unwrap(), None);

        create::handle(&ctx.pool, &admin, CreateDataSetsCommand { creations: vec![physical("DS")] })
            .await
            .unwrap();
        let session = ctx.session(GROUP_POWER_USER).await;
        let err = handle(&ctx.pool, &session, command(&["DS"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with DataSetPermId = [DS]");
    }
}
