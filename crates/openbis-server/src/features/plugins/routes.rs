//! Plugin API routes
//!
//! - `POST /api/v3/plugins` - Create plugins
//! - `PUT /api/v3/plugins` - Update plugins
//! - `POST /api/v3/plugins/get` - Get plugins by name
//! - `POST /api/v3/plugins/search` - Search plugins
//! - `POST /api/v3/plugins/delete` - Delete unbound plugins

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreatePluginsCommand, DeletePluginsCommand, GetPluginsQuery, SearchPluginsQuery, UpdatePluginsCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn plugins_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_plugins).put(update_plugins))
        .route("/get", post(get_plugins))
        .route("/search", post(search_plugins))
        .route("/delete", post(delete_plugins))
}

async fn create_plugins(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreatePluginsCommand>,
) -> ApiResult<Response> {
    let names = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(names))
}

async fn update_plugins(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdatePluginsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_plugins(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetPluginsQuery>,
) -> ApiResult<Response> {
    let plugins = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(plugins).into_response())
}

async fn search_plugins(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchPluginsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_plugins(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeletePluginsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
