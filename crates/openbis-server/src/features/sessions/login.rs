use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    access_log,
    auth::{open_session, verify_password},
    config::SessionConfig,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCommand {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
}

impl LoginCommand {
    pub fn validate(&self) -> ApiResult<()> {
        if self.user.trim().is_empty() || self.password.is_empty() {
            return Err(ApiError::AuthenticationFailure);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, config, command), fields(user = %command.user))]
pub async fn handle(
    pool: &SqlitePool,
    config: &SessionConfig,
    command: LoginCommand,
) -> ApiResult<LoginResponse> {
    command.validate()?;

    let person: Option<(i64, Option<String>, bool)> = sqlx::query_as(
        "SELECT p.id, c.password_hash, p.active FROM persons p \
         LEFT JOIN credentials c ON c.person_id = p.id WHERE p.user_id = ?",
    )
    .bind(command.user.trim())
    .fetch_optional(pool)
    .await?;

    let person_id = match person {
        Some((id, Some(hash), true)) if verify_password(&command.password, &hash) => id,
        _ => {
            tracing::warn!(user = %command.user, "Login failed");
            return Err(ApiError::AuthenticationFailure);
        },
    };

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(&mut *tx)
        .await?;
    let token = open_session(
        &mut tx,
        person_id,
        command.user.trim(),
        now + Duration::minutes(config.timeout_minutes),
    )
    .await?;
    tx.commit().await?;

    access_log::record(command.user.trim(), "login", &[("USER", command.user.clone())]);
    Ok(LoginResponse { token })
}
