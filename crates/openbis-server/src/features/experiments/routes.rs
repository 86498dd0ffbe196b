//! Experiment API routes
//!
//! - `POST /api/v3/experiments` - Create experiments
//! - `PUT /api/v3/experiments` - Update experiments
//! - `POST /api/v3/experiments/get` - Get experiments by id
//! - `POST /api/v3/experiments/search` - Search experiments
//! - `POST /api/v3/experiments/delete` - Move to the trash, answering the deletion id (`null` when nothing matched)

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateExperimentsCommand, DeleteExperimentsCommand, GetExperimentsQuery, SearchExperimentsQuery,
    UpdateExperimentsCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn experiments_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_experiments).put(update_experiments))
        .route("/get", post(get_experiments))
        .route("/search", post(search_experiments))
        .route("/delete", post(delete_experiments))
}

async fn create_experiments(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateExperimentsCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(ids))
}

async fn update_experiments(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateExperimentsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_experiments(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetExperimentsQuery>,
) -> ApiResult<Response> {
    let objects = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(objects).into_response())
}

async fn search_experiments(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchExperimentsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_experiments(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteExperimentsCommand>,
) -> ApiResult<Response> {
    let deletion_id = super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(deletion_id).into_response())
}
