pub mod get;
pub mod search;

use chrono::{DateTime, Utc};
use openbis_common::types::{Role, RoleLevel};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::level_of;
use crate::{
    auth::ReadScope,
    error::ApiResult,
    features::shared::{fetch::Fetched, identifiers::project_identifier},
};

pub use get::GetRoleAssignmentsQuery;
pub use search::{RoleAssignmentSearchCriteria, SearchRoleAssignmentsQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAssignmentFetchOptions {
    pub registrator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: i64,
    pub role: Role,
    pub role_level: RoleLevel,
    pub space: Option<String>,
    /// `/SPACE/PROJECT` of a project level role
    pub project: Option<String>,
    pub user: Option<String>,
    pub authorization_group: Option<String>,
    pub registration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Fetched::is_not_fetched")]
    pub registrator: Fetched<Option<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AssignmentRow {
    pub id: i64,
    pub role: String,
    pub space_id: Option<i64>,
    pub space_code: Option<String>,
    pub project_id: Option<i64>,
    pub project_code: Option<String>,
    pub project_space_id: Option<i64>,
    pub project_space_code: Option<String>,
    pub user_id: Option<String>,
    pub group_code: Option<String>,
    pub registrator: Option<String>,
    pub registration_date: DateTime<Utc>,
}

impl AssignmentRow {
    /// Instance roles are public; scoped roles follow the read scope of their space
    pub fn readable(&self, scope: &ReadScope) -> bool {
        scope.allows(self.space_id.or(self.project_space_id), self.project_id)
    }

    pub fn into_assignment(self, fetch: &RoleAssignmentFetchOptions) -> ApiResult<RoleAssignment> {
        let project = match (&self.project_space_code, &self.project_code) {
            (Some(space), Some(code)) => Some(project_identifier(space, code)),
            _ => None,
        };
        Ok(RoleAssignment {
            id: self.id,
            role: self.role.parse()?,
            role_level: level_of(self.space_id, self.project_id),
            space: self.space_code.or(self.project_space_code),
            project,
            user: self.user_id,
            authorization_group: self.group_code,
            registration_date: self.registration_date,
            registrator: Fetched::when(fetch.registrator, || self.registrator.clone()),
        })
    }
}

pub(crate) async fn load_rows(conn: &mut SqliteConnection) -> ApiResult<Vec<AssignmentRow>> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        r#"
        SELECT r.id, r.role, r.space_id, s.code AS space_code, r.project_id, p.code AS project_code,
               p.space_id AS project_space_id, ps.code AS project_space_code,
               pe.user_id, g.code AS group_code, reg.user_id AS registrator, r.registration_date
        FROM role_assignments r
        LEFT JOIN spaces s ON s.id = r.space_id
        LEFT JOIN projects p ON p.id = r.project_id
        LEFT JOIN spaces ps ON ps.id = p.space_id
        LEFT JOIN persons pe ON pe.id = r.person_id
        LEFT JOIN authorization_groups g ON g.id = r.group_id
        LEFT JOIN persons reg ON reg.id = r.registrator_id
        ORDER BY r.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
