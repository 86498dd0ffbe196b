//! Create external data management systems command

use chrono::Utc;
use openbis_common::types::AddressType;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::{authorization::require_instance_admin, Session},
    error::ApiResult,
    features::{
        external_dms::validate_address,
        shared::{
            error_helpers::map_unique_violation,
            validation::{blank_to_none, require_non_empty, validate_code},
        },
    },
};

fn default_address_type() -> AddressType {
    AddressType::Openbis
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalDmsCreation {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_address_type")]
    pub address_type: AddressType,
}

impl ExternalDmsCreation {
    pub fn new(code: &str, address: &str, address_type: AddressType) -> Self {
        Self {
            code: Some(code.to_string()),
            label: None,
            address: Some(address.to_string()),
            address_type,
        }
    }
}

crate::struct_log_repr!(ExternalDmsCreation, "ExternalDmsCreation", "code" => code);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateExternalDmsCommand {
    pub creations: Vec<ExternalDmsCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateExternalDmsCommand,
) -> ApiResult<Vec<String>> {
    require_instance_admin(session, "Creating external data management systems")?;

    let mut codes = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        let code = validate_code(require_non_empty(creation.code.as_deref(), "Code")?, "External DMS")?;
        let address = validate_address(creation.address.as_deref(), creation.address_type)?;

        sqlx::query(
            "INSERT INTO external_dms (code, label, address, address_type, registration_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&code)
        .bind(blank_to_none(creation.label.clone()))
        .bind(&address)
        .bind(creation.address_type.as_str())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("External DMS '{}' already exists", code)))?;
        codes.push(code);
    }
    Ok(codes)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    command: CreateExternalDmsCommand,
) -> ApiResult<Vec<String>> {
    access_log::record(
        &session.user_id,
        "create-external-data-management-systems",
        &[("NEW_EXTERNAL_DMSS", command.creations.log_repr())],
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
        features::shared::test_helpers::{TestContext, NON_ADMIN_USERS},
    };

    async fn create(ctx: &TestContext, creation: ExternalDmsCreation) -> ApiResult<Vec<String>> {
        let admin = ctx.admin().await;
        handle(&ctx.pool, &admin, CreateExternalDmsCommand { creations: vec![creation] }).await
    }

    #[tokio::test]
    async fn test_create_each_address_type() {
        let ctx = TestContext::new().await;
        let codes = create(&ctx, ExternalDmsCreation::new("gitlab", "https://gitlab.example/${code}", AddressType::Url))
            .await
            .unwrap();
        assert_eq!(codes, vec!["GITLAB"]);
        create(&ctx, ExternalDmsCreation::new("FS", "host:/mnt/data", AddressType::FileSystem))
            .await
            .unwrap();
        create(&ctx, ExternalDmsCreation::new("OB", "https://openbis.example", AddressType::Openbis))
            .await
            .unwrap();
        assert_eq!(ctx.count("SELECT COUNT(*) FROM external_dms").await, 3);
    }

    #[tokio::test]
    async fn test_mandatory_fields() {
        let ctx = TestContext::new().await;
        let mut creation = ExternalDmsCreation::new("X", "host:/a", AddressType::FileSystem);
        creation.code = Some(" ".into());
        assert_eq!(create(&ctx, creation).await.unwrap_err().to_string(), "Code cannot be empty");

        let mut creation = ExternalDmsCreation::new("X", "host:/a", AddressType::FileSystem);
        creation.address = None;
        assert_eq!(create(&ctx, creation).await.unwrap_err().to_string(), "Address cannot be empty");

        let creation = ExternalDmsCreation::new("X", "/no/host", AddressType::FileSystem);
        assert_eq!(create(&ctx, creation).await.unwrap_err().to_string(), "Invalid address");
    }

    #[tokio::test]
    async fn test_non_admins_rejected() {
        let ctx = TestContext::new().await;
        for user in NON_ADMIN_USERS {
            let session = ctx.session(user).await;
            let command = CreateExternalDmsCommand {
                creations: vec![ExternalDmsCreation::new("X", "a", AddressType::Url)],
            };
            let err = handle(&ctx.pool, &session, command).await.unwrap_err();
            assert!(matches!(err, ApiError::AuthorizationFailure(_)), "{}", user);
        }
    }
}
