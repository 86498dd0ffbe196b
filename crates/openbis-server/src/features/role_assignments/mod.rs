//! Role assignments: a role granted to a person or an authorization group on
//! the instance, a space or a project.
//!
//! Assignments are addressed by their technical id.

pub mod commands;
pub mod queries;
pub mod routes;

use openbis_common::types::{Role, RoleLevel};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
};

pub use commands::{CreateRoleAssignmentsCommand, DeleteRoleAssignmentsCommand, RoleAssignmentCreation};
pub use queries::{
    GetRoleAssignmentsQuery, RoleAssignment, RoleAssignmentFetchOptions, RoleAssignmentSearchCriteria,
    SearchRoleAssignmentsQuery,
};
pub use routes::role_assignments_routes;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AssignmentRecord {
    pub id: i64,
    pub role: String,
    pub space_id: Option<i64>,
    pub space_code: Option<String>,
    pub project_id: Option<i64>,
    pub project_space_id: Option<i64>,
    pub person_id: Option<i64>,
}

impl AssignmentRecord {
    pub fn level(&self) -> RoleLevel {
        level_of(self.space_id, self.project_id)
    }
}

pub(crate) fn level_of(space_id: Option<i64>, project_id: Option<i64>) -> RoleLevel {
    match (space_id, project_id) {
        (_, Some(_)) => RoleLevel::Project,
        (Some(_), None) => RoleLevel::Space,
        (None, None) => RoleLevel::Instance,
    }
}

pub(crate) async fn resolve(conn: &mut SqliteConnection, id: i64) -> ApiResult<Option<AssignmentRecord>> {
    let record = sqlx::query_as::<_, AssignmentRecord>(
        r#"
        SELECT r.id, r.role, r.space_id, s.code AS space_code, r.project_id,
               p.space_id AS project_space_id, r.person_id
        FROM role_assignments r
        LEFT JOIN spaces s ON s.id = r.space_id
        LEFT JOIN projects p ON p.id = r.project_id
        WHERE r.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

/// Granting or revoking roles needs ADMIN on the scope the role applies to
pub(crate) fn require_admin_on(
    session: &Session,
    space_id: Option<i64>,
    project: Option<(i64, i64)>,
    id: impl ToString,
) -> ApiResult<()> {
    let allowed = match (space_id, project) {
        (_, Some((project_id, project_space_id))) => {
            session.has_project_role(project_id, project_space_id, Role::Admin)
        },
        (Some(space), None) => session.has_space_role(space, Role::Admin),
        (None, None) => session.is_instance_admin(),
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::unauthorized("RoleAssignmentTechId", id))
    }
}
