//! Trash management
//!
//! Deleting experiments, samples or data sets parks them in a deletion. A
//! deletion can be listed, confirmed (the objects are purged for good) or
//! reverted (the objects come back). Only the registrator of a deletion and
//! instance admins may see or act on it.

pub mod commands;
pub mod queries;
pub mod routes;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
};

pub use commands::{ConfirmDeletionsCommand, RevertDeletionsCommand};
pub use queries::{DeletedObject, Deletion, DeletionFetchOptions, DeletionSearchCriteria, SearchDeletionsQuery};
pub use routes::deletions_routes;

#[derive(Debug, Clone, FromRow)]
pub struct DeletionRecord {
    pub id: i64,
    pub reason: String,
    pub registrator_id: Option<i64>,
    pub registration_date: DateTime<Utc>,
}

impl DeletionRecord {
    pub fn visible_to(&self, session: &Session) -> bool {
        self.registrator_id == Some(session.person_id) || session.is_instance_admin()
    }

    pub fn authorize(&self, session: &Session) -> ApiResult<()> {
        if self.visible_to(session) {
            Ok(())
        } else {
            Err(ApiError::unauthorized("DeletionTechId", self.id))
        }
    }
}

pub async fn resolve(conn: &mut SqliteConnection, id: i64) -> ApiResult<Option<DeletionRecord>> {
    let record = sqlx::query_as::<_, DeletionRecord>(
        "SELECT id, reason, registrator_id, registration_date FROM deletions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}
