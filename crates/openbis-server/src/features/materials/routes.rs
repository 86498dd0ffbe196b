//! Material API routes
//!
//! - `POST /api/v3/materials` - Create materials
//! - `PUT /api/v3/materials` - Update materials
//! - `POST /api/v3/materials/get` - Get materials by id
//! - `POST /api/v3/materials/search` - Search materials
//! - `POST /api/v3/materials/delete` - Delete materials

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateMaterialsCommand, DeleteMaterialsCommand, GetMaterialsQuery, SearchMaterialsQuery,
    UpdateMaterialsCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn materials_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_materials).put(update_materials))
        .route("/get", post(get_materials))
        .route("/search", post(search_materials))
        .route("/delete", post(delete_materials))
}

async fn create_materials(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateMaterialsCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(ids))
}

async fn update_materials(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateMaterialsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_materials(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetMaterialsQuery>,
) -> ApiResult<Response> {
    let objects = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(objects).into_response())
}

async fn search_materials(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchMaterialsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_materials(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteMaterialsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
