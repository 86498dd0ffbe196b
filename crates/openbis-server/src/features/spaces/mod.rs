//! Spaces: the top level containers of projects and samples

pub mod commands;
pub mod queries;
pub mod routes;

use sqlx::SqliteConnection;

use crate::error::{ApiError, ApiResult};

pub use commands::{CreateSpacesCommand, DeleteSpacesCommand, SpaceCreation, SpaceUpdate, UpdateSpacesCommand};
pub use queries::{GetSpacesQuery, SearchSpacesQuery, Space, SpaceFetchOptions, SpaceSearchCriteria};
pub use routes::spaces_routes;

/// Row id of a space given by code
pub(crate) async fn require_id(conn: &mut SqliteConnection, code: &str) -> ApiResult<i64> {
    let code = code.trim().to_uppercase();
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM spaces WHERE code = ?")
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
    id.ok_or_else(|| ApiError::not_found("SpacePermId", code))
}
