//! Update persons command
//!
//! Everybody may change their own names, email, home space and password.
//! Changing other persons and (de)activating anybody needs an instance admin.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin_for, store_password, Session},
    error::{ApiError, ApiResult},
    features::{
        persons,
        shared::{updates::present, validation::blank_to_none},
        spaces::require_id as space_id,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonUpdate {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `null` clears the home space
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub space_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl PersonUpdate {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePersonsCommand {
    pub updates: Vec<PersonUpdate>,
}

pub async fn execute(conn: &mut SqliteConnection, session: &Session, command: &UpdatePersonsCommand) -> ApiResult<()> {
    for update in &command.updates {
        let person = persons::require(conn, &update.user_id).await?;
        let own = person.id == session.person_id;
        if !own || update.active.is_some() {
            require_instance_admin_for(session, "PersonPermId", &person.user_id)?;
        }
        if own && update.active == Some(false) {
            return Err(ApiError::user("You cannot deactivate yourself"));
        }

        for (column, value) in [
            ("first_name", &update.first_name),
            ("last_name", &update.last_name),
            ("email", &update.email),
        ] {
            if let Some(value) = value {
                let sql = format!("UPDATE persons SET {} = ? WHERE id = ?", column);
                sqlx::query(&sql)
                    .bind(blank_to_none(Some(value.clone())))
                    .bind(person.id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        if let Some(space) = &update.space_id {
            let home = match space {
                Some(code) => Some(space_id(conn, code).await?),
                None => None,
            };
            sqlx::query("UPDATE persons SET home_space_id = ? WHERE id = ?")
                .bind(home)
                .bind(person.id)
                .execute(&mut *conn)
                .await?;
        }

        if let Some(password) = &update.password {
            if password.is_empty() {
                return Err(ApiError::user("Password cannot be empty"));
            }
            store_password(conn, person.id, password).await?;
        }

        if let Some(active) = update.active {
            sqlx::query("UPDATE persons SET active = ? WHERE id = ?")
                .bind(active)
                .bind(person.id)
                .execute(&mut *conn)
                .await?;
            if !active {
                sqlx::query("DELETE FROM sessions WHERE person_id = ?")
                    .bind(person.id)
                    .execute(&mut *conn)
                    .await?;
                tracing::info!(user = %person.user_id, "Person deactivated");
            }
        }
    }
    Ok(())
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.updates.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: UpdatePersonsCommand) -> ApiResult<()> {
    let ids: Vec<&String> = command.updates.iter().map(|u| &u.user_id).collect();
    access_log::record(&session.user_id, "update-persons", &[("PERSON_IDS", ids.log_repr())]);

    let mut tx = pool.begin().await?;
    execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(())
}
