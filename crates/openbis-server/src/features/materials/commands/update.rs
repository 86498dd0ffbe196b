use chrono::Utc;
use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_role, Session},
    error::ApiResult,
    features::{
        materials,
        shared::{
            properties::{self, PropertyMap},
            tags, ListUpdate, MaterialPermId, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialUpdate {
    pub material_id: MaterialPermId,
    /// Blank values remove a property
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: ListUpdate<TagId>,
}

impl MaterialUpdate {
    pub fn new(material_id: MaterialPermId) -> Self {
        Self {
            material_id,
            properties: PropertyMap::new(),
            tag_ids: ListUpdate::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMaterialsCommand {
    pub updates: Vec<MaterialUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateMaterialsCommand,
) -> ApiResult<()> {
    require_instance_role(session, Role::User, "Material update")?;
    let now = Utc::now();
    for update in &command.updates {
        let material = materials::require(conn, &update.material_id).await?;
        properties::store(
            conn,
            EntityKind::Material,
            material.id,
            material.type_id,
            &material.type_code,
            &update.properties,
            false,
        )
        .await?;
        tags::apply_update(conn, session, EntityKind::Material, material.id, &update.tag_ids).await?;

        sqlx::query("UPDATE materials SET modification_date = ? WHERE id = ?")
            .bind(now)
            .bind(material.id)
            .execute(&mut *conn)
            .await?;
        outbox::record(conn, EntityKind::Material, &material.perm_id().to_string(), IndexAction::Upsert).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateMaterialsCommand) -> ApiResult<()> {
    let ids: Vec<&MaterialPermId> = command.updates.iter().map(|u| &u.material_id).collect();
    access_log::record(&session.user_id, "update-materials", &[("MATERIAL_UPDATES", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::ApiError,
        features::{
            materials::commands::create::{self, CreateMaterialsCommand, MaterialCreation},
            shared::test_helpers::TestContext,
        },
    };

    #[tokio::test]
    async fn test_update_properties_and_tags() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let mut ad3 = MaterialCreation::new("VIRUS", "AD3");
        ad3.properties.insert("DESCRIPTION".into(), "first".into());
        create::handle(&ctx.pool, &admin, CreateMaterialsCommand { creations: vec![ad3] })
            .await
            .unwrap();

        let mut update = MaterialUpdate::new(MaterialPermId::new("ad3", "virus"));
        update.properties.insert("DESCRIPTION".into(), "".into());
        update.tag_ids = ListUpdate::adding(vec![TagId::Code("VIRAL".into())]);
        handle(&ctx.pool, &admin, UpdateMaterialsCommand { updates: vec![update] })
            .await
            .unwrap();

        assert_eq!(ctx.count("SELECT COUNT(*) FROM entity_properties WHERE entity_kind = 'MATERIAL'").await, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM entity_tags WHERE entity_kind = 'MATERIAL'").await, 1);
    }

    #[tokio::test]
    async fn test_missing_material() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let update = MaterialUpdate::new(MaterialPermId::new("NOPE", "VIRUS"));
        let err = handle(&ctx.pool, &admin, UpdateMaterialsCommand { updates: vec![update] })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Object with MaterialPermId = [NOPE (VIRUS)] has not been found");
        assert!(matches!(err, ApiError::ObjectNotFound { .. }));
    }
}
