//! Delete samples command
//!
//! Samples go to the trash with their components and data sets.

use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_context, Session},
    error::{ApiError, ApiResult},
    features::{
        samples::resolve,
        shared::{trash, validation::validate_deletion, EntityRef},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSamplesCommand {
    pub ids: Option<Vec<EntityRef>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteSamplesCommand,
) -> ApiResult<Option<i64>> {
    let (ids, reason) = validate_deletion(&command.ids, &command.reason)?;

    let mut roots = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(sample) = resolve(conn, id).await? else {
            continue;
        };
        let (kind, name) = sample.describe(id);
        let role = if sample.space_id.is_some() { Role::PowerUser } else { Role::Admin };
        if require_context(session, sample.space_id, sample.project_id, kind, &name, role).is_err() {
            return Err(ApiError::unauthorized(kind, name));
        }
        if !roots.contains(&sample.id) {
            roots.push(sample.id);
        }
    }

    trash::move_to_trash(conn, session, reason, EntityKind::Sample, &roots).await
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteSamplesCommand) -> ApiResult<Option<i64>> {
    access_log::record(
        &session.user_id,
        "delete-samples",
        &[
            ("SAMPLE_IDS", command.ids.log_repr()),
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
        samples::commands::create::{self, CreateSamplesCommand, SampleCreation},
        shared::test_helpers::{TestContext, SPACE_POWER_USER, SPACE_USER},
    };

    async fn create_plate_with_well(ctx: &TestContext, space: &str) {
        let admin = ctx.admin().await;
        let plate = SampleCreation::new("CELL_PLATE", Some(space), Some("PLATE"));
        create::handle(&ctx.pool, &admin, CreateSamplesCommand { creations: vec![plate] })
            .await
            .unwrap();
        let mut well = SampleCreation::new("WELL", Some(space), Some("A01"));
        well.container_id = Some(EntityRef::identifier(format!("/{}/PLATE", space)));
        create::handle(&ctx.pool, &admin, CreateSamplesCommand { creations: vec![well] })
            .await
            .unwrap();
    }

    fn command(identifier: &str) -> DeleteSamplesCommand {
        DeleteSamplesCommand {
            ids: Some(vec![EntityRef::identifier(identifier)]),
            reason: Some("cleanup".into()),
        }
    }

    #[tokio::test]
    async fn test_components_follow_container_into_trash() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        create_plate_with_well(&ctx, "CISD").await;

        let deletion_id = handle(&ctx.pool, &admin, command("/CISD/PLATE")).await.unwrap().unwrap();
        let trashed = ctx
            .count(&format!("SELECT COUNT(*) FROM samples WHERE deletion_id = {}", deletion_id))
            .await;
        assert_eq!(trashed, 2);
        assert_eq!(
            ctx.count("SELECT COUNT(*) FROM deleted_objects WHERE identifier = '/CISD/PLATE:A01'").await,
            1
        );
    }

    #[tokio::test]
    async fn test_space_power_user_only() {
        let ctx = TestContext::new().await;
        create_plate_with_well(&ctx, "TEST-SPACE").await;

        let user = ctx.session(SPACE_USER).await;
        let err = handle(&ctx.pool, &user, command("/TEST-SPACE/PLATE")).await.unwrap_err();
        assert_eq!(err.to_string(), "Access denied to object with SampleIdentifier = [/TEST-SPACE/PLATE]");

        let power_user = ctx.session(SPACE_POWER_USER).await;
        assert!(handle(&ctx.pool, &power_user, command("/TEST-SPACE/PLATE"))
            .await
            .unwrap()
            .is_some());
    }
}
