use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    auth::{authorization::require_space, Session},
    error::{ApiError, ApiResult},
    features::shared::validation::blank_to_none,
};
use openbis_common::types::Role;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceUpdate {
    pub space_id: String,
    /// New description; an empty string clears it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpacesCommand {
    pub updates: Vec<SpaceUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateSpacesCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let code = update.space_id.trim().to_uppercase();
        let space_id: Option<i64> = sqlx::query_scalar("SELECT id FROM spaces WHERE code = ?")
            .bind(&code)
            .fetch_optional(&mut *conn)
            .await?;
        let space_id = space_id.ok_or_else(|| ApiError::not_found("SpacePermId", &code))?;
        require_space(session, space_id, &code, Role::Admin)?;

        if let Some(description) = &update.description {
            sqlx::query("UPDATE spaces SET description = ?, modification_date = ? WHERE id = ?")
                .bind(blank_to_none(Some(description.clone())))
                .bind(Utc::now())
                .bind(space_id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateSpacesCommand) -> ApiResult<()> {
    let ids: Vec<&str> = command.updates.iter().map(|u| u.space_id.as_str()).collect();
    access_log::record(&session.user_id, "update-spaces", &[("SPACE_UPDATES", format!("{:?}", ids))]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
