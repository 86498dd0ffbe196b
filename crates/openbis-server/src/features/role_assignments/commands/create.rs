//! Create role assignments command

use chrono::Utc;
use openbis_common::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    access_log,
    access_log::LogRepr,
    auth::Session,
    error::{ApiError, ApiResult},
    features::{
        authorization_groups, persons, projects,
        role_assignments::{level_of, require_admin_on},
        shared::EntityRef,
        spaces,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignmentCreation {
    pub role: Role,
    /// Space code for a space level role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    /// Project for a project level role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_group_id: Option<String>,
}

impl RoleAssignmentCreation {
    pub fn for_user(role: Role, user_id: impl Into<String>) -> Self {
        Self {
            role,
            space_id: None,
            project_id: None,
            user_id: Some(user_id.into()),
            authorization_group_id: None,
        }
    }

    pub fn for_group(role: Role, group_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            authorization_group_id: Some(group_id.into()),
            ..Self::for_user(role, "")
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        match (&self.user_id, &self.authorization_group_id) {
            (None, None) => return Err(ApiError::user("Either user or authorization group has to be specified")),
            (Some(_), Some(_)) => {
                return Err(ApiError::user("User and authorization group cannot both be specified"))
            },
            _ => {},
        }
        if self.space_id.is_some() && self.project_id.is_some() {
            return Err(ApiError::user("Space and project cannot both be specified"));
        }
        if self.role == Role::EtlServer && (self.space_id.is_some() || self.project_id.is_some()) {
            return Err(ApiError::user("ETL_SERVER role can only be assigned on the instance level"));
        }
        Ok(())
    }
}

impl LogRepr for RoleAssignmentCreation {
    fn log_repr(&self) -> String {
        let grantee = match (&self.user_id, &self.authorization_group_id) {
            (Some(user), _) => format!("user={}", user),
            (None, Some(group)) => format!("authorizationGroup={}", group),
            (None, None) => String::new(),
        };
        let scope = match (&self.space_id, &self.project_id) {
            (Some(space), _) => format!(",space={}", space),
            (None, Some(project)) => format!(",project={}", project),
            (None, None) => String::new(),
        };
        format!("RoleAssignmentCreation[role={},{}{}]", self.role, grantee, scope)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoleAssignmentsCommand {
    pub creations: Vec<RoleAssignmentCreation>,
}

pub async fn execute(
    conn: &mut SqliteConnection,
    session: &Session,
    command: &CreateRoleAssignmentsCommand,
) -> ApiResult<Vec<i64>> {
    let now = Utc::now();
    let mut ids = Vec::with_capacity(command.creations.len());
    for creation in &command.creations {
        creation.validate()?;

        let (space_id, project) = match (&creation.space_id, &creation.project_id) {
            (Some(code), _) => (Some(spaces::require_id(conn, code).await?), None),
            (None, Some(project)) => {
                let project = projects::require(conn, project).await?;
                (None, Some((project.id, project.space_id)))
            },
            (None, None) => (None, None),
        };
        require_admin_on(session, space_id, project, creation.log_repr())?;

        let person_id = match &creation.user_id {
            Some(user_id) => Some(persons::require(conn, user_id).await?.id),
            None => None,
        };
        let group_id = match &creation.authorization_group_id {
            Some(code) => Some(authorization_groups::require(conn, code).await?.id),
            None => None,
        };
        let project_id = project.map(|(id, _)| id);

        let existing: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM role_assignments
            WHERE role = ? AND space_id IS ? AND project_id IS ? AND person_id IS ? AND group_id IS ?
            "#,
        )
        .bind(creation.role.as_str())
        .bind(space_id)
        .bind(project_id)
        .bind(person_id)
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await?;
        if existing > 0 {
            return Err(ApiError::user(format!(
                "{} role assignment {} already exists",
                level_of(space_id, project_id),
                creation.log_repr()
            )));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO role_assignments
                (role, space_id, project_id, person_id, group_id, registrator_id, registration_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(creation.role.as_str())
        .bind(space_id)
        .bind(project_id)
        .bind(person_id)
        .bind(group_id)
        .bind(session.person_id)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        ids.push(id);
    }
    Ok(ids)
}

#[tracing::instrument(skip(pool, session, command), fields(user = %session.user_id, count = command.creations.len()))]
pub async fn handle(pool: &SqlitePool, session: &Session, command: CreateRoleAssignmentsCommand) -> ApiResult<Vec<i64>> {
    access_log::record(
        &session.user_id,
        "create-role-assignments",
        &[("NEW_ROLE_ASSIGNMENTS", command.creations.log_repr())],
    );

    let mut tx = pool.begin().await?;
    let ids = execute(&mut tx, session, &command).await?;
    tx.commit().await?;
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestContext, GROUP_ADMIN, SPACE_OBSERVER, SPACE_POWER_USER};

    fn command(creation: RoleAssignmentCreation) -> CreateRoleAssignmentsCommand {
        CreateRoleAssignmentsCommand { creations: vec![creation] }
    }

    #[tokio::test]
    async fn test_space_role_takes_effect() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = RoleAssignmentCreation {
            space_id: Some("CISD".into()),
            ..RoleAssignmentCreation::for_user(Role::PowerUser, SPACE_OBSERVER)
        };
        let ids = handle(&ctx.pool, &admin, command(creation)).await.unwrap();
        assert_eq!(ids.len(), 1);

        let observer = ctx.session(SPACE_OBSERVER).await;
        let cisd = ctx.id_of("spaces", "code", "CISD").await;
        assert!(observer.has_space_role(cisd, Role::PowerUser));
    }

    #[tokio::test]
    async fn test_space_admin_grants_on_own_space_only() {
        let ctx = TestContext::new().await;
        let group_admin = ctx.session(GROUP_ADMIN).await;

        let own = RoleAssignmentCreation {
            space_id: Some("TESTGROUP".into()),
            ..RoleAssignmentCreation::for_user(Role::Observer, SPACE_OBSERVER)
        };
        handle(&ctx.pool, &group_admin, command(own)).await.unwrap();

        let foreign = RoleAssignmentCreation {
            space_id: Some("CISD".into()),
            ..RoleAssignmentCreation::for_user(Role::Observer, SPACE_OBSERVER)
        };
        let err = handle(&ctx.pool, &group_admin, command(foreign)).await.unwrap_err();
        assert!(matches!(err, ApiError::UnauthorizedObjectAccess { .. }));
    }

    #[tokio::test]
    async fn test_project_role_for_group() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = RoleAssignmentCreation {
            project_id: Some(EntityRef::identifier("/CISD/NEMO")),
            ..RoleAssignmentCreation::for_group(Role::User, "GROUP_OBSERVERS")
        };
        handle(&ctx.pool, &admin, command(creation)).await.unwrap();
        assert_eq!(
            ctx.count("SELECT COUNT(*) FROM role_assignments WHERE project_id IS NOT NULL").await,
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let ctx = TestContext::new().await;
        let admin = ctx.admin().await;
        let creation = RoleAssignmentCreation {
            space_id: Some("TEST-SPACE".into()),
            ..RoleAssignmentCreation::for_user(Role::PowerUser, SPACE_POWER_USER)
        };
        let err = handle(&ctx.pool, &admin, command(creation)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "SPACE role assignment RoleAssignmentCreation[role=POWER_USER,user=test_space_power_user,space=TEST-SPACE] already exists"
        );
    }

    #[test]
    fn test_grantee_and_scope_validation() {
        let mut creation = RoleAssignmentCreation::for_user(Role::User, "u");
        creation.authorization_group_id = Some("G".into());
        assert!(creation.validate().is_err());

        let creation = RoleAssignmentCreation {
            user_id: None,
            ..RoleAssignmentCreation::for_user(Role::User, "u")
        };
        assert_eq!(
            creation.validate().unwrap_err().to_string(),
            "Either user or authorization group has to be specified"
        );

        let creation = RoleAssignmentCreation {
            space_id: Some("CISD".into()),
            ..RoleAssignmentCreation::for_user(Role::EtlServer, "etl")
        };
        assert!(creation.validate().is_err());
    }
}
