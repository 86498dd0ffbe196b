//! Delete materials command
//!
//! Materials are removed immediately. One that is still the value of a
//! property is being used.

use openbis_common::types::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, Session},
    error::{ApiError, ApiResult},
    features::{
        materials,
        shared::{properties, validation::validate_deletion, MaterialPermId},
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteMaterialsCommand {
    pub ids: Option<Vec<MaterialPermId>>,
    pub reason: Option<String>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &DeleteMaterialsCommand,
) -> ApiResult<()> {
    let (ids, _reason) = validate_deletion(&command.ids, &command.reason)?;

    for id in ids {
        require_instance_admin_for(session, "MaterialPermId", materials::normalize(id))?;
        let Some(material) = materials::resolve(conn, id).await? else {
            continue;
        };
        let perm_id = material.perm_id();

        let usages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entity_properties WHERE material_id = ?")
            .bind(material.id)
            .fetch_one(&mut *conn)
            .await?;
        if usages > 0 {
            return Err(ApiError::being_used(format!("Material '{}'", perm_id)));
        }

        properties::delete_all(conn, EntityKind::Material, &[material.id]).await?;
        sqlx::query("DELETE FROM entity_tags WHERE entity_kind = ? AND entity_id = ?")
            .bind(EntityKind::Material.as_str())
            .bind(material.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM materials WHERE id = ?")
            .bind(material.id)
            .execute(&mut *conn)
            .await?;
        outbox::record(conn, EntityKind::Material, &perm_id.to_string(), IndexAction::Remove).await?;
        tracing::debug!(material = %perm_id, "Material deleted");
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: DeleteMaterialsCommand) -> ApiResult<()> {
    access_log::record(
        &session.user_id,
        "delete-materials",
        &[
            ("MATERIAL_IDS", command.ids.log_repr()),
            ("REASON", command.reason.log_repr()),
        ],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
