//! Create persons command

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, store_password, Session},
    error::{ApiError, ApiResult},
    features::{
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, require_non_empty},
        },
        spaces::require_id as space_id,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonCreation {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Home space code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    /// Without a password the person cannot log in
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl PersonCreation {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

crate::struct_log_repr!(PersonCreation, "PersonCreation", "userId" => user_id);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePersonsCommand {
    pub creations: Vec<PersonCreation>,
}

fn validate_user_id(raw: &str) -> ApiResult<String> {
    let user_id = require_non_empty(Some(raw), "User id")?;
    if user_id.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ApiError::user(format!("User id '{}' contains illegal characters", user_id)));
    }
    Ok(user_id.to_string())
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreatePersonsCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating persons")?;

    let now = Utc::now();
    let mut user_ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let user_id = validate_user_id(&creation.user_id)?;
        let home_space_id = match &creation.space_id {
            Some(code) => Some(space_id(conn, code).await?),
            None => None,
        };

        let person_id = sqlx::query(
            r#"
            INSERT INTO persons
                (user_id, first_name, last_name, email, active, home_space_id,
                 registrator_id, registration_date)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(blank_to_none(creation.first_name.clone()))
        .bind(blank_to_none(creation.last_name.clone()))
        .bind(blank_to_none(creation.email.clone()))
        .bind(home_space_id)
        .bind(session.person_id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Person '{}' already exists", user_id)))?
        .last_insert_rowid();
        if let Some(password) = &creation.password {
            store_password(conn, person_id, password).await?;
        }
        user_ids.push(user_id);
    }
    Ok(user_ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: CreatePersonsCommand) -> ApiResult<Vec<String>> {
    access_log::record(&session.user_id, "create-persons", &[("NEW_PERSONS", command.creations.log_repr())]);

    let mut tx = pool.begin().await?;
    let user_ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(user_ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        features::{
            sessions::login::{self, LoginCommand},
            shared::test_helpers::{TestContext, GROUP_ADMIN},
        },
    };

    #[tokio::test]
    async fn test_created_person_can_log_in() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = PersonCreation {
            password: Some("secret".into()),
            space_id: Some("cisd".into()),
            ..PersonCreation::new("new_user")
        };
        handle(&ctx.pool, &admin, CreatePersonsCommand { creations: vec![creation] })
            .await
            .unwrap();

        let response = login::handle(
            &ctx.pool,
            &ctx.config.session,
            LoginCommand {
                user: "new_user".into(),
                password: "secret".into(),
            },
        )
        .await
        .unwrap();
        assert!(response.token.starts_with("new_user-"));
    }

    #[tokio::test]
    async fn test_invalid_and_duplicate_user_ids() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        for (user_id, message) in [
            (" ", "User id cannot be empty"),
            ("two words", "User id 'two words' contains illegal characters"),
            ("admin", "Person 'admin' already exists"),
        ] {
            let command = CreatePersonsCommand {
                creations: vec![PersonCreation::new(user_id)],
            };
            let err = handle(&ctx.pool, &admin, command).await.unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[tokio::test]
    async fn test_unknown_home_space() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = PersonCreation {
            space_id: Some("NOWHERE".into()),
            ..PersonCreation::new("someone")
        };
        let err = handle(&ctx.pool, &admin, CreatePersonsCommand { creations: vec![creation] })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Object with SpacePermId = [NOWHERE] has not been found");
    }

    #[tokio::test]
    async fn test_group_admin_rejected() {
        let ctx = TestContext::new().await;
        let session = ctx.session(GROUP_ADMIN).await;
        let err = handle(
            &ctx.pool,
            &session,
            CreatePersonsCommand {
                creations: vec![PersonCreation::new("x")],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailure(_)));
    }
}
