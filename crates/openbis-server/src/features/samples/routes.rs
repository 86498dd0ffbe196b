//! Sample API routes
//!
//! - `POST /api/v3/samples` - Create samples
//! - `PUT /api/v3/samples` - Update samples
//! - `POST /api/v3/samples/get` - Get samples by id
//! - `POST /api/v3/samples/search` - Search samples
//! - `POST /api/v3/samples/delete` - Move to the trash, answering the deletion id (`null` when nothing matched)

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateSamplesCommand, DeleteSamplesCommand, GetSamplesQuery, SearchSamplesQuery,
    UpdateSamplesCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn samples_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_samples).put(update_samples))
        .route("/get", post(get_samples))
        .route("/search", post(search_samples))
        .route("/delete", post(delete_samples))
}

async fn create_samples(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateSamplesCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(ids))
}

async fn update_samples(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateSamplesCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_samples(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetSamplesQuery>,
) -> ApiResult<Response> {
    let objects = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(objects).into_response())
}

async fn search_samples(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchSamplesQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_samples(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteSamplesCommand>,
) -> ApiResult<Response> {
    let deletion_id = super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(deletion_id).into_response())
}
