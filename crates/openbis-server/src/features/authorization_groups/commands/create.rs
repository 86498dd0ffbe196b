//! Create authorization groups command

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::ApiResult,
    features::{
        authorization_groups::person_ids,
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, validate_code},
        },
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationGroupCreation {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Members by user id
    #[serde(default)]
    pub user_ids: Vec<String>,
}

crate::struct_log_repr!(AuthorizationGroupCreation, "AuthorizationGroupCreation", "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAuthorizationGroupsCommand {
    pub creations: Vec<AuthorizationGroupCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateAuthorizationGroupsCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating authorization groups")?;

    let now = Utc::now();
    let mut codes = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_code(&creation.code, "Authorization group")?;
        let members = person_ids(conn, &creation.user_ids).await?;

        let group_id = sqlx::query(
            r#"
            INSERT INTO authorization_groups (code, description, registrator_id, registration_date, modification_date)
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
        .map_err(|e| map_unique_violation(e, || format!("Authorization group '{}' already exists", code)))?
        .last_insert_rowid();

        for person_id in members {
            sqlx::query("INSERT OR IGNORE INTO authorization_group_persons (group_id, person_id) VALUES (?, ?)")
                .bind(group_id)
                .bind(person_id)
                .execute(&mut *conn)
                .await?;
        }
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateAuthorizationGroupsCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        "create-authorization-groups",
        &[("NEW_AUTHORIZATION_GROUPS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let codes = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(codes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::ApiError,
        features::shared::test_helpers::{TestContext, NON_ADMIN_USERS, SPACE_USER},
    };

    fn creation(code: &str, users: &[&str]) -> CreateAuthorizationGroupsCommand {
        CreateAuthorizationGroupsCommand {
            creations: vec![AuthorizationGroupCreation {
                code: code.into(),
                description: Some("a group".into()),
                user_ids: users.iter().map(|u| u.to_string()).collect(),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_with_members() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let codes = handle(&ctx.pool, &admin, creation("new-group", &[SPACE_USER, "admin"]))
            .await
            .unwrap();
        assert_eq!(codes, vec!["NEW-GROUP"]);
        let group_id = ctx.id_of("authorization_groups", "code", "NEW-GROUP").await;
        assert_eq!(
            ctx.count(&format!(
                "SELECT COUNT(*) FROM authorization_group_persons WHERE group_id = {}",
                group_id
            ))
            .await,
            2
        );
    }

    #[tokio::test]
    async fn test_unknown_member_fails_whole_batch() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let err = handle(&ctx.pool, &admin, creation("G1", &["ghost"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Object with PersonPermId = [ghost] has not been found");
        assert_eq!(ctx.count("SELECT COUNT(*) FROM authorization_groups WHERE code = 'G1'").await, 0);
    }

    #[tokio::test]
    async fn test_non_admins_rejected() {
        let ctx = TestContext::new().await;
        for user in NON_ADMIN_USERS {
            let session = ctx.session(user).await;
            let err = handle(&ctx.pool, &session, creation("G2", &[])).await.unwrap_err();
            assert!(matches!(err, ApiError::AuthorizationFailure(_)), "{}", user);
        }
    }
}
