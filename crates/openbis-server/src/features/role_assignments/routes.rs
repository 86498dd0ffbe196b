//! Role assignment API routes
//!
//! - `POST /api/v3/role-assignments` - Grant roles
//! - `POST /api/v3/role-assignments/get` - Get role assignments by technical id
//! - `POST /api/v3/role-assignments/search` - Search role assignments
//! - `POST /api/v3/role-assignments/delete` - Revoke roles

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateRoleAssignmentsCommand, DeleteRoleAssignmentsCommand, GetRoleAssignmentsQuery,
    SearchRoleAssignmentsQuery,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn role_assignments_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_role_assignments))
        .route("/get", post(get_role_assignments))
        .route("/search", post(search_role_assignments))
        .route("/delete", post(delete_role_assignments))
}

async fn create_role_assignments(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateRoleAssignmentsCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(ids))
}

async fn get_role_assignments(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetRoleAssignmentsQuery>,
) -> ApiResult<Response> {
    let assignments = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(assignments).into_response())
}

async fn search_role_assignments(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchRoleAssignmentsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_role_assignments(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteRoleAssignmentsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
