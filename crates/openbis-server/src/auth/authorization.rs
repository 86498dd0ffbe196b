//! Role checks
//!
//! Roles are ranked OBSERVER < USER < POWER_USER < ADMIN. An instance role
//! applies everywhere, a space role to the space and everything in it, a
//! project role to the project and its content.

use openbis_common::types::{Role, RoleLevel};
use std::collections::HashSet;

use super::Session;
use crate::error::{ApiError, ApiResult};

/// What a session may read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadScope {
    All,
    Limited {
        spaces: HashSet<i64>,
        projects: HashSet<i64>,
    },
}

impl ReadScope {
    /// Whether an object living in `space_id` (and optionally `project_id`) is readable.
    ///
    /// Objects without a space (shared samples, materials) are readable by everybody.
    pub fn allows(&self, space_id: Option<i64>, project_id: Option<i64>) -> bool {
        match self {
            ReadScope::All => true,
            ReadScope::Limited { spaces, projects } => match space_id {
                None => true,
                Some(space) => {
                    spaces.contains(&space) || project_id.is_some_and(|p| projects.contains(&p))
                },
            },
        }
    }

    /// Whether the space itself can be listed
    pub fn allows_space(&self, space_id: i64) -> bool {
        match self {
            ReadScope::All => true,
            ReadScope::Limited { spaces, .. } => spaces.contains(&space_id),
        }
    }
}

impl Session {
    fn grants_at(&self, level: RoleLevel) -> impl Iterator<Item = &super::RoleGrant> {
        self.roles.iter().filter(move |grant| grant.level == level)
    }

    pub fn has_instance_role(&self, required: Role) -> bool {
        self.grants_at(RoleLevel::Instance)
            .any(|grant| grant.role.covers(required))
    }

    pub fn is_instance_admin(&self) -> bool {
        self.has_instance_role(Role::Admin)
    }

    pub fn has_space_role(&self, space_id: i64, required: Role) -> bool {
        self.has_instance_role(required)
            || self
                .grants_at(RoleLevel::Space)
                .any(|grant| grant.space_id == Some(space_id) && grant.role.covers(required))
    }

    pub fn has_project_role(&self, project_id: i64, space_id: i64, required: Role) -> bool {
        self.has_space_role(space_id, required)
            || self
                .grants_at(RoleLevel::Project)
                .any(|grant| grant.project_id == Some(project_id) && grant.role.covers(required))
    }

    /// Whether the session holds `required` on any space or project
    pub fn has_any_role(&self, required: Role) -> bool {
        self.roles.iter().any(|grant| grant.role.covers(required))
    }

    pub fn read_scope(&self) -> ReadScope {
        if self.has_instance_role(Role::Observer) {
            return ReadScope::All;
        }

        let mut spaces = HashSet::new();
        let mut projects = HashSet::new();
        for grant in &self.roles {
            match grant.level {
                RoleLevel::Space => {
                    spaces.extend(grant.space_id);
                },
                RoleLevel::Project => {
                    projects.extend(grant.project_id);
                },
                RoleLevel::Instance => {},
            }
        }
        ReadScope::Limited { spaces, projects }
    }
}

/// Reject callers that are not instance admins
pub fn require_instance_admin(session: &Session, action: &str) -> ApiResult<()> {
    if session.is_instance_admin() {
        Ok(())
    } else {
        Err(ApiError::AuthorizationFailure(format!(
            "{} requires instance admin rights, user '{}' does not have them",
            action, session.user_id
        )))
    }
}

/// Reject non instance admins, naming the object they tried to touch
pub fn require_instance_admin_for(
    session: &Session,
    kind: &'static str,
    id: impl ToString,
) -> ApiResult<()> {
    if session.is_instance_admin() {
        Ok(())
    } else {
        Err(ApiError::unauthorized(kind, id))
    }
}

/// Require `required` on an instance level
pub fn require_instance_role(session: &Session, required: Role, action: &str) -> ApiResult<()> {
    if session.has_instance_role(required) {
        Ok(())
    } else {
        Err(ApiError::AuthorizationFailure(format!(
            "{} requires at least {} rights on the instance",
            action, required
        )))
    }
}

/// Require `required` on a space; `space_code` names the object on failure
pub fn require_space(
    session: &Session,
    space_id: i64,
    space_code: &str,
    required: Role,
) -> ApiResult<()> {
    if session.has_space_role(space_id, required) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("SpacePermId", space_code))
    }
}

/// Require `required` on a project; `identifier` names the object on failure
pub fn require_project(
    session: &Session,
    project_id: i64,
    space_id: i64,
    identifier: &str,
    required: Role,
) -> ApiResult<()> {
    if session.has_project_role(project_id, space_id, required) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("ProjectIdentifier", identifier))
    }
}

/// Require `required` on the context an object lives in.
///
/// Objects without a space (shared samples) need the instance role.
pub fn require_context(
    session: &Session,
    space_id: Option<i64>,
    project_id: Option<i64>,
    kind: &'static str,
    id: &str,
    required: Role,
) -> ApiResult<()> {
    let allowed = match (space_id, project_id) {
        (Some(space), Some(project)) => session.has_project_role(project, space, required),
        (Some(space), None) => session.has_space_role(space, required),
        (None, _) => session.has_instance_role(required),
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::unauthorized(kind, id))
    }
}
