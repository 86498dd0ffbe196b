//! Materials: typed entities shared by the whole instance
//!
//! A material is addressed by its code together with its type code, written
//! `CODE (TYPE)` wherever a single string is needed. Materials are not
//! trashed; deleting one that a property still points at is refused.

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::{ApiError, ApiResult},
    features::shared::MaterialPermId,
};

pub use commands::{
    CreateMaterialsCommand, DeleteMaterialsCommand, MaterialCreation, MaterialUpdate, UpdateMaterialsCommand,
};
pub use queries::{GetMaterialsQuery, Material, MaterialFetchOptions, MaterialSearchCriteria, SearchMaterialsQuery};
pub use routes::materials_routes;

#[derive(Debug, Clone, FromRow)]
pub struct MaterialRecord {
    pub id: i64,
    pub code: String,
    pub type_id: i64,
    pub type_code: String,
}

impl MaterialRecord {
    pub fn perm_id(&self) -> MaterialPermId {
        MaterialPermId::new(&self.code, &self.type_code)
    }
}

pub(crate) fn normalize(id: &MaterialPermId) -> MaterialPermId {
    MaterialPermId::new(id.code.trim().to_uppercase(), id.type_code.trim().to_uppercase())
}

pub async fn resolve(conn: &mut SqliteConnection, id: &MaterialPermId) -> ApiResult<Option<MaterialRecord>> {
    let id = normalize(id);
    let record = sqlx::query_as::<_, MaterialRecord>(
        r#"
        SELECT m.id, m.code, m.type_id, t.code AS type_code
        FROM materials m
        JOIN entity_types t ON t.id = m.type_id
        WHERE m.code = ? AND t.code = ? AND t.kind = 'MATERIAL'
        "#,
    )
    .bind(&id.code)
    .bind(&id.type_code)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn require(conn: &mut SqliteConnection, id: &MaterialPermId) -> ApiResult<MaterialRecord> {
    resolve(conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("MaterialPermId", normalize(id)))
}
