pub mod create;
pub mod delete;
pub mod update;

use openbis_common::types::Role;
use sqlx::SqliteConnection;

use crate::{
    auth::{authorization::require_context, Session},
    error::{ApiError, ApiResult},
    features::{experiments, projects, shared::EntityRef, spaces},
};

pub use create::{CreateSamplesCommand, SampleCreation};
pub use delete::DeleteSamplesCommand;
pub use update::{SampleUpdate, UpdateSamplesCommand};

/// Where a sample lives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Placement {
    pub space_id: Option<i64>,
    pub space_code: Option<String>,
    pub project_id: Option<i64>,
    pub project_code: Option<String>,
    pub experiment_id: Option<i64>,
}

impl Placement {
    /// Require `role` where the sample lives, naming the narrowest context
    pub fn authorize(&self, session: &Session, role: Role, sample_identifier: &str) -> ApiResult<()> {
        let (kind, id) = match (&self.space_code, &self.project_code) {
            (Some(space), Some(project)) => ("ProjectIdentifier", format!("/{}/{}", space, project)),
            (Some(space), None) => ("SpacePermId", space.clone()),
            (None, _) => ("SampleIdentifier", sample_identifier.to_string()),
        };
        require_context(session, self.space_id, self.project_id, kind, &id, role)
    }
}

/// Work out the space, project and experiment of a sample.
///
/// The experiment decides the space and must belong to the project when
/// both are given; the project decides the space otherwise.
pub(crate) async fn resolve_placement(
    conn: &mut SqliteConnection,
    space: Option<&str>,
    project: Option<&EntityRef>,
    experiment: Option<&EntityRef>,
) -> ApiResult<Placement> {
    let space_code = space.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty());

    if let Some(experiment) = experiment {
        let experiment = experiments::require(conn, experiment).await?;
        if let Some(project) = project {
            let project = projects::require(conn, project).await?;
            if project.id != experiment.project_id {
                return Err(ApiError::user("Sample project must be the same as experiment project"));
            }
        }
        if space_code.as_ref().is_some_and(|code| *code != experiment.space_code) {
            return Err(ApiError::user("Sample space must be the same as experiment space"));
        }
        return Ok(Placement {
            space_id: Some(experiment.space_id),
            space_code: Some(experiment.space_code.clone()),
            project_id: project.map(|_| experiment.project_id),
            project_code: project.map(|_| experiment.project_code.clone()),
            experiment_id: Some(experiment.id),
        });
    }

    if let Some(project) = project {
        let project = projects::require(conn, project).await?;
        if space_code.as_ref().is_some_and(|code| *code != project.space_code) {
            return Err(ApiError::user("Sample space must be the same as project space"));
        }
        return Ok(Placement {
            space_id: Some(project.space_id),
            space_code: Some(project.space_code),
            project_id: Some(project.id),
            project_code: Some(project.code),
            experiment_id: None,
        });
    }

    match space_code {
        Some(code) => {
            let space_id = spaces::require_id(conn, &code).await?;
            Ok(Placement {
                space_id: Some(space_id),
                space_code: Some(code),
                ..Default::default()
            })
        },
        None => Ok(Placement::default()),
    }
}
