use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_all, ExternalDms};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetExternalDmsQuery {
    pub ids: Vec<String>,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetExternalDmsQuery,
) -> ApiResult<BTreeMap<String, ExternalDms>> {
    access_log::record(
        &session.user_id,
        "get-external-data-management-systems",
        &[("EXTERNAL_DMS_IDS", query.ids.log_repr())],
    );

    let wanted: Vec<String> = query.ids.iter().map(|id| id.trim().to_uppercase()).collect();
    let mut conn = pool.acquire().await?;
    Ok(load_all(&mut conn)
        .await?
        .into_iter()
        .filter(|dms| wanted.contains(&dms.code))
        .map(|dms| (dms.perm_id.clone(), dms))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::{
        external_dms::commands::{create, CreateExternalDmsCommand, ExternalDmsCreation},
        shared::test_helpers::TestContext,
    };
    use openbis_common::types::AddressType;

    #[tokio::test]
    async fn test_create_then_get_returns_every_field() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = ExternalDmsCreation {
            label: Some("Git repositories".into()),
            ..ExternalDmsCreation::new("GIT", "host:/repos", AddressType::FileSystem)
        };
        create::handle(&ctx.pool, &admin, CreateExternalDmsCommand { creations: vec![creation] })
            .await
            .unwrap();

        let found = handle(
            &ctx.pool,
            &admin,
            GetExternalDmsQuery {
                ids: vec!["git".into(), "NONE".into()],
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        let git = &found["GIT"];
        assert_eq!(git.code, "GIT");
        assert_eq!(git.label.as_deref(), Some("Git repositories"));
        assert_eq!(git.address, "host:/repos");
        assert_eq!(git.address_type, "FILE_SYSTEM");
    }
}
