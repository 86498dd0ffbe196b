//! Authorization group API routes
//!
//! - `POST /api/v3/authorization-groups` - Create groups
//! - `PUT /api/v3/authorization-groups` - Update groups
//! - `POST /api/v3/authorization-groups/get` - Get groups by code
//! - `POST /api/v3/authorization-groups/search` - Search groups
//! - `POST /api/v3/authorization-groups/delete` - Delete groups

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateAuthorizationGroupsCommand, DeleteAuthorizationGroupsCommand, GetAuthorizationGroupsQuery,
    SearchAuthorizationGroupsQuery, UpdateAuthorizationGroupsCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn authorization_groups_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_groups).put(update_groups))
        .route("/get", post(get_groups))
        .route("/search", post(search_groups))
        .route("/delete", post(delete_groups))
}

async fn create_groups(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateAuthorizationGroupsCommand>,
) -> ApiResult<Response> {
    let codes = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(codes))
}

async fn update_groups(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateAuthorizationGroupsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_groups(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetAuthorizationGroupsQuery>,
) -> ApiResult<Response> {
    let groups = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(groups).into_response())
}

async fn search_groups(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchAuthorizationGroupsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_groups(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteAuthorizationGroupsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
