//! Create spaces command

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::ApiResult,
    features::shared::{
        error_helpers::map_unique_violation,
        validation::{blank_to_none, validate_code},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceCreation {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

crate::struct_log_repr!(SpaceCreation, "SpaceCreation", "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSpacesCommand {
    pub creations: Vec<SpaceCreation>,
}

impl CreateSpacesCommand {
    pub fn validate(&self) -> ApiResult<()> {
        for creation in &self.creations {
            validate_code(&creation.code, "Space")?;
        }
        Ok(())
    }
}

/// Insert the spaces, returning their perm ids (the codes)
pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateSpacesCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating spaces")?;
    command.validate()?;

    let now = Utc::now();
    let mut codes = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_code(&creation.code, "Space")?;
        sqlx::query(
            r#"
            INSERT INTO spaces (code, description, registrator_id, registration_date, modification_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code)
        .bind(blank_to_none(creation.description.clone()))
        .bind(session.person_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Space '{}' already exists", code)))?;
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateSpacesCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-spaces", &[("NEW_SPACES", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let codes = execute(&mut tx, session, &command).await?;
    tx.commit().await?;

    tracing::info!(count = codes.len(), "Spaces created");
    Ok(codes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::ApiError,
        features::shared::test_helpers::{TestContext, NON_ADMIN_USERS},
    };

    fn command(codes: &[&str]) -> CreateSpacesCommand {
        CreateSpacesCommand {
            creations: codes
                .iter()
                .map(|code| SpaceCreation {
                    code: code.to_string(),
                    description: Some("a description".into()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_validation_rejects_bad_codes() {
        assert!(command(&["GOOD"]).validate().is_ok());
        assert!(command(&["BAD CODE"]).validate().is_err());
        assert!(command(&[""]).validate().is_err());
    }

    #[tokio::test]
    async fn test_create_uppercases_code() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let codes = handle(&ctx.pool, &admin, command(&["new_space"])).await.unwrap();
        assert_eq!(codes, vec!["NEW_SPACE"]);
    }

    #[tokio::test]
    async fn test_duplicate_fails_whole_batch() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle(&ctx.pool, &admin, command(&["FRESH", "CISD"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Space 'CISD' already exists");
        assert_eq!(ctx.count("SELECT COUNT(*) FROM spaces WHERE code = 'FRESH'").await, 0);
    }

    #[tokio::test]
    async fn test_non_admins_are_rejected() {
        let ctx = TestContext::new().await;
        for user in NON_ADMIN_USERS {
            let session = ctx.session(user).await;
            let err = handle(&ctx.pool, &session, command(&["NOT_ALLOWED"])).await.unwrap_err();
            assert!(matches!(err, ApiError::AuthorizationFailure(_)), "{}", user);
        }
    }
}
