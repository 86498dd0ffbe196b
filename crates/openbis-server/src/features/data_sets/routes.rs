//! Data set API routes
//!
//! - `POST /api/v3/data-sets` - Create data sets
//! - `PUT /api/v3/data-sets` - Update data sets
//! - `POST /api/v3/data-sets/get` - Get data sets by id
//! - `POST /api/v3/data-sets/search` - Search data sets
//! - `POST /api/v3/data-sets/delete` - Move to the trash, answering the deletion id (`null` when nothing matched)

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateDataSetsCommand, DeleteDataSetsCommand, GetDataSetsQuery, SearchDataSetsQuery,
    UpdateDataSetsCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn data_sets_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_data_sets).put(update_data_sets))
        .route("/get", post(get_data_sets))
        .route("/search", post(search_data_sets))
        .route("/delete", post(delete_data_sets))
}

async fn create_data_sets(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateDataSetsCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(ids))
}

async fn update_data_sets(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateDataSetsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_data_sets(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetDataSetsQuery>,
) -> ApiResult<Response> {
    let objects = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(objects).into_response())
}

async fn search_data_sets(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchDataSetsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_data_sets(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteDataSetsCommand>,
) -> ApiResult<Response> {
    let deletion_id = super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(deletion_id).into_response())
}
