//! Delete entity types command
//!
//! A type can only go once nothing refers to it: no instance (trashed ones
//! count until the deletion is confirmed) and, for material types, no
//! property type restricted to it.

use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::instance_count;
use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{
        entity_types::{resolve_type, EntityKindSpec},
        shared::validation::validate_deletion,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteEntityTypesCommand {
    pub ids: Option<Vec<String>>,
    pub reason: Option<String>,
}

pub async fn execute<S: EntityKindSpec>(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteEntityTypesCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        require_instance_admin_for(session, "EntityTypePermId", id.trim().to_uppercase())?;
        let Some(record) = resolve_type(conn, S::KIND, id).await? else {
            continue;
        };

        let mut used = instance_count(conn, S::KIND, record.id).await?;
        if S::KIND == EntityKind::Material {
            let restricted: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM property_types WHERE material_type_id = ?")
                    .bind(record.id)
                    .fetch_one(&mut *conn)
                    .await?;
            used += restricted;
        }
        if used > 0 {
            return Err(ApiError::being_used(format!(
                "{} type '{}'",
                S::KIND.label(),
                record.code
            )));
        }

        sqlx::query("DELETE FROM entity_types WHERE id = ?")
            .bind(record.id)
            .execute(&mut *conn)
            .await?;
        tracing::info!(kind = %S::KIND, code = %record.code, "Entity type deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, kind = %S::KIND))]
pub async fn handle<S: EntityKindSpec>(
    pool: &SqlitePool,
    session: &Session,
    command: DeleteEntityTypesCommand,
) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        &format!("delete-{}", S::operation_noun()),
        &[
            ("ENTITY_TYPE_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute::<S>(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        entity_types::{MaterialTypes, SampleTypes},
        shared::test_helpers::{TestContext, NON_ADMIN_USERS},
    };

    fn command(ids: &[&str]) -> DeleteEntityTypesCommand {
        DeleteEntityTypesCommand {
            ids: Some(ids.iter().map(|s| s.to_string()).collect()),
            reason: Some("cleanup".into()),
        }
    }

    async fn insert_sample(ctx: &TestContext, type_code: &str) {
        sqlx::query(
            "INSERT INTO samples (perm_id, code, type_id, space_id, registration_date, modification_date) \
             SELECT 'S-PERM-1', 'S1', t.id, s.id, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z' \
             FROM entity_types t, spaces s WHERE t.kind = 'SAMPLE' AND t.code = ? AND s.code = 'CISD'",
        )
        .bind(type_code)
        .execute(&ctx.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_unused_type_is_deleted() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle::<SampleTypes>(&ctx.pool, &admin, command(&["well"])).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM entity_types WHERE code = 'WELL'").await, 0);
    }

    #[tokio::test]
    async fn test_type_with_instance_is_being_used() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        insert_sample(&ctx, "CELL_PLATE").await;
        let err = handle::<SampleTypes>(&ctx.pool, &admin, command(&["CELL_PLATE"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Sample type 'CELL_PLATE' is being used");
    }

    #[tokio::test]
    async fn test_material_type_restricting_property_is_being_used() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        sqlx::query(
            "INSERT INTO property_types (code, label, description, data_type, material_type_id, registration_date) \
             SELECT 'INFECTING_VIRUS', 'Virus', 'Virus', 'MATERIAL', id, '2026-01-01T00:00:00Z' FROM entity_types WHERE code = 'VIRUS'",
        )
        .execute(&ctx.pool)
        .await
        .unwrap();
        let err = handle::<MaterialTypes>(&ctx.pool, &admin, command(&["VIRUS"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Material type 'VIRUS' is being used");
    }

    #[tokio::test]
    async fn test_unknown_type_and_empty_list_are_noops() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        handle::<SampleTypes>(&ctx.pool, &admin, command(&["DOES_NOT_EXIST"])).await.unwrap();
        handle::<SampleTypes>(&ctx.pool, &admin, command(&[])).await.unwrap();
        // a data set type code is unknown among sample types
        handle::<SampleTypes>(&ctx.pool, &admin, command(&["HCS_IMAGE"])).await.unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM entity_types WHERE code = 'HCS_IMAGE'").await, 1);
    }

    #[tokio::test]
    async fn test_reason_and_ids_required() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle::<SampleTypes>(
            &ctx.pool,
            &admin,
            DeleteEntityTypesCommand {
                ids: Some(vec!["WELL".into()]),
                reason: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Deletion reason cannot be null");

        let err = handle::<SampleTypes>(
            &ctx.pool,
            &admin,
            DeleteEntityTypesCommand {
                ids: None,
                reason: Some("r".into()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Entity ids cannot be null");
    }

    #[tokio::test]
    async fn test_non_admins_are_rejected_naming_the_type() {
        let ctx = TestContext::new().await;
        for user in NON_ADMIN_USERS {
            let session = ctx.session(user).await;
            let err = handle::<SampleTypes>(&ctx.pool, &session, command(&["WELL"])).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "Access denied to object with EntityTypePermId = [WELL]",
                "{}",
                user
            );
        }
    }
}
