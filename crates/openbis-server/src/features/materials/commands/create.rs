use chrono::Utc;
use openbis_common::types::{EntityKind, Role};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_role, Session},
    error::{ApiError, ApiResult},
    features::{
        entity_types::require_type,
        shared::{
            properties::{self, PropertyMap},
            tags,
            validation::validate_code,
            MaterialPermId, TagId,
        },
    },
    index::{outbox, IndexAction},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialCreation {
    /// Material type code
    pub type_id: String,
    pub code: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

impl MaterialCreation {
    pub fn new(type_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            code: code.into(),
            properties: PropertyMap::new(),
            tag_ids: Vec::new(),
        }
    }
}

crate::struct_log_repr!(MaterialCreation, "MaterialCreation", "code" => code, "typeId" => type_id);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMaterialsCommand {
    pub creations: Vec<MaterialCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateMaterialsCommand,
) -> ApiResult<Vec<MaterialPermId>> {
    require_instance_role(session, Role::User, "Material registration")?;
    let now = Utc::now();
    let mut perm_ids = Vec::with_capacity(command.creations.len());

    for creation in &command.creations {
        let code = validate_code(&creation.code, "Material")?;
        let entity_type = require_type(conn, EntityKind::Material, &creation.type_id).await?;
        let perm_id = MaterialPermId::new(&code, &entity_type.code);

        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE type_id = ? AND code = ?")
            .bind(entity_type.id)
            .bind(&code)
            .fetch_one(&mut *conn)
            .await?;
        if taken > 0 {
            return Err(ApiError::user(format!("Material '{}' already exists", perm_id)));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO materials (code, type_id, registrator_id, registration_date, modification_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code)
        .bind(entity_type.id)
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        properties::store(
            conn,
            EntityKind::Material,
            id,
            entity_type.id,
            &entity_type.code,
            &creation.properties,
            true,
        )
        .await?;
        let tag_ids = tags::resolve_or_create(conn, session, &creation.tag_ids).await?;
        tags::link(conn, EntityKind::Material, id, &tag_ids).await?;

        outbox::record(conn, EntityKind::Material, &perm_id.to_string(), IndexAction::Upsert).await?;
        perm_ids.push(perm_id);
    }
    Ok(perm_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateMaterialsCommand,
) -> ApiResult<Vec<MaterialPermId>> {
    access_log::record(
        &session.user_id,
        "create-materials",
        &[("NEW_MATERIALS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let perm_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(perm_ids)
}
