pub mod create;
pub mod delete;
pub mod update;

use openbis_common::types::{DataSetKind, Role};
use sqlx::SqliteConnection;

use crate::{
    auth::{authorization::require_context, Session},
    error::{ApiError, ApiResult},
    features::{experiments, samples, shared::EntityRef},
};

pub use create::{CreateDataSetsCommand, DataSetCreation, PhysicalDataCreation};
pub use delete::DeleteDataSetsCommand;
pub use update::{DataSetUpdate, PhysicalDataUpdate, UpdateDataSetsCommand};

/// The experiment and sample a data set hangs off, with the context used
/// for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Owner {
    pub experiment_id: Option<i64>,
    pub sample_id: Option<i64>,
    pub space_id: Option<i64>,
    pub project_id: Option<i64>,
    kind: &'static str,
    identifier: String,
}

impl Owner {
    pub fn authorize(&self, session: &Session, role: Role) -> ApiResult<()> {
        require_context(session, self.space_id, self.project_id, self.kind, &self.identifier, role)
    }
}

/// Resolve the owner of a data set.
///
/// A sample in an experiment pins the experiment; shared samples cannot own
/// data sets.
pub(crate) async fn resolve_owner(
    conn: &mut SqliteConnection,
    experiment: Option<&EntityRef>,
    sample: Option<&EntityRef>,
) -> ApiResult<Owner> {
    let experiment = match experiment {
        Some(id) => Some(experiments::require(conn, id).await?),
        None => None,
    };

    let Some(sample_ref) = sample else {
        let experiment = experiment.ok_or_else(|| ApiError::user("Data set needs an experiment or a sample"))?;
        return Ok(Owner {
            experiment_id: Some(experiment.id),
            sample_id: None,
            space_id: Some(experiment.space_id),
            project_id: Some(experiment.project_id),
            kind: "ExperimentIdentifier",
            identifier: experiment.identifier(),
        });
    };

    let sample = samples::require(conn, sample_ref).await?;
    let identifier = sample.identifier();
    let Some(space_id) = sample.space_id else {
        return Err(ApiError::user(format!(
            "Data set cannot be registered for shared sample '{}'",
            identifier
        )));
    };

    let experiment_id = match (sample.experiment_id, &experiment) {
        (Some(own), Some(given)) if own != given.id => {
            return Err(ApiError::user("Data set experiment must be the same as sample experiment"));
        },
        (Some(own), _) => Some(own),
        (None, Some(given)) => {
            return Err(ApiError::user(format!(
                "Data set cannot be registered for experiment '{}' and sample '{}' outside of it",
                given.identifier(),
                identifier
            )));
        },
        (None, None) => None,
    };
    let project_id = match experiment_id {
        Some(id) => Some(
            sqlx::query_scalar::<_, i64>("SELECT project_id FROM experiments WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?,
        ),
        None => sample.project_id,
    };

    Ok(Owner {
        experiment_id,
        sample_id: Some(sample.id),
        space_id: Some(space_id),
        project_id,
        kind: "SampleIdentifier",
        identifier,
    })
}

/// Physical data belongs to PHYSICAL data sets, linked data to LINK ones
pub(crate) fn check_kind_payload(
    code: &str,
    kind: DataSetKind,
    has_physical: bool,
    has_linked: bool,
) -> ApiResult<()> {
    if has_physical && kind != DataSetKind::Physical {
        return Err(ApiError::user(format!(
            "Physical data can only be set for PHYSICAL data sets, '{}' is {}",
            code, kind
        )));
    }
    if has_linked && kind != DataSetKind::Link {
        return Err(ApiError::user(format!(
            "Linked data can only be set for LINK data sets, '{}' is {}",
            code, kind
        )));
    }
    Ok(())
}
