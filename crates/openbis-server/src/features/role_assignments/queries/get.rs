use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{load_rows, RoleAssignment, RoleAssignmentFetchOptions};
use crate::{access_log, access_log::LogRepr, auth::Session, error::ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetRoleAssignmentsQuery {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub fetch_options: RoleAssignmentFetchOptions,
}

#[tracing::instrument(skip(pool, session, query), fields(user = %session.user_id))]
pub async fn handle(
    pool: &SqlitePool,
    session: &Session,
    query: GetRoleAssignmentsQuery,
) -> ApiResult<BTreeMap<i64, RoleAssignment>> {
    access_log::record(&session.user_id, "get-role-assignments", &[("ROLE_ASSIGNMENT_IDS", query.ids.log_repr())]);

    let scope = session.read_scope();
    let mut conn = pool.acquire().await?;
    load_rows(&mut conn)
        .await?
        .into_iter()
        .filter(|row| query.ids.contains(&row.id) && row.readable(&scope))
        .map(|row| Ok((row.id, row.into_assignment(&query.fetch_options)?)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, GROUP_OBSERVER, SPACE_USER};
    use openbis_common::types::{Role, RoleLevel};

    async fn all_ids(ctx: &TestContext) -> Vec<i64> {
        sqlx::query_scalar("SELECT id FROM role_assignments").fetch_all(&ctx.pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_group_role_shape() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let query = GetRoleAssignmentsQuery {
            ids: all_ids(&ctx).await,
            ..Default::default()
        };
        let found = handle(&ctx.pool, &admin, query).await.unwrap();
        let group_role = found
            .values()
            .find(|a| a.authorization_group.as_deref() == Some("GROUP_OBSERVERS"))
            .unwrap();
        assert_eq!(group_role.role, Role::Observer);
        assert_eq!(group_role.role_level, RoleLevel::Space);
        assert_eq!(group_role.space.as_deref(), Some("TESTGROUP"));
        assert!(group_role.user.is_none());
    }

    #[tokio::test]
    async fn test_space_scoped_caller_sees_own_space_and_instance_roles() {
        let ctx = TestContext::new().await;
        let observer = ctx.session(GROUP_OBSERVER).await;
        let query = GetRoleAssignmentsQuery {
            ids: all_ids(&ctx).await,
            ..Default::default()
        };
        let found = handle(&ctx.pool, &observer, query).await.unwrap();
        assert!(found.values().all(|a| a.space.as_deref() != Some("TEST-SPACE")));
        assert!(found.values().any(|a| a.user.as_deref() == Some("admin")));
        assert!(!found.values().any(|a| a.user.as_deref() == Some(SPACE_USER)));
    }
}
