//! Project API routes
//!
//! - `POST /api/v3/projects` - Create projects
//! - `PUT /api/v3/projects` - Update projects
//! - `POST /api/v3/projects/get` - Get projects by perm id or identifier
//! - `POST /api/v3/projects/search` - Search projects
//! - `POST /api/v3/projects/delete` - Delete projects

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreateProjectsCommand, DeleteProjectsCommand, GetProjectsQuery, SearchProjectsQuery, UpdateProjectsCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn projects_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_projects).put(update_projects))
        .route("/get", post(get_projects))
        .route("/search", post(search_projects))
        .route("/delete", post(delete_projects))
}

/// Create projects
///
/// # Response
///
/// - `201 Created` - Perm ids of the new projects
/// - `403 Forbidden` - Caller lacks POWER_USER on the space
async fn create_projects(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateProjectsCommand>,
) -> ApiResult<Response> {
    let perm_ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(perm_ids))
}

async fn update_projects(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateProjectsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    state.index.notify();
    Ok(ApiResponse::success(()).into_response())
}

async fn get_projects(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetProjectsQuery>,
) -> ApiResult<Response> {
    let projects = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(projects).into_response())
}

async fn search_projects(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchProjectsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_projects(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteProjectsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
