use openbis_common::types::AddressType;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    auth::{authorization::require_instance_admin_for, Session},
    error::ApiResult,
    features::{
        external_dms::{require, validate_address},
        shared::validation::blank_to_none,
    },
};

/// The address is checked against the resulting address type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalDmsUpdate {
    pub external_dms_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<AddressType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExternalDmsCommand {
    pub updates: Vec<ExternalDmsUpdate>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &UpdateExternalDmsCommand,
) -> ApiResult<()> {
    for update in &command.updates {
        let record = require(conn, &update.external_dms_id).await?;
        require_instance_admin_for(session, "ExternalDmsPermId", &record.code)?;

        let address_type = match update.address_type {
            Some(address_type) => address_type,
            None => record.address_type()?,
        };
        let address = validate_address(Some(update.address.as_deref().unwrap_or(&record.address)), address_type)?;

        if let Some(label) = &update.label {
            sqlx::query("UPDATE external_dms SET label = ? WHERE id = ?")
                .bind(blank_to_none(Some(label.clone())))
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
        sqlx::query("UPDATE external_dms SET address = ?, address_type = ? WHERE id = ?")
            .bind(&address)
            .bind(address_type.as_str())
            .bind(record.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdateExternalDmsCommand) -> ApiResult<()> {
    let ids: Vec<&str> = command.updates.iter().map(|u| u.external_dms_id.as_str()).collect();
    access_log::record(
        &session.user_id,
        "update-external-data-management-systems",
        &[("EXTERNAL_DMS_UPDATES", format!("{:?}", ids))],
    );

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
