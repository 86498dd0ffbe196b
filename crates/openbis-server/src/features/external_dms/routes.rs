//! External data management system API routes
//!
//! - `POST /api/v3/external-dms` - Create external data management systems
//! - `PUT /api/v3/external-dms` - Update external data management systems
//! - `POST /api/v3/external-dms/get` - Get systems by code
//! - `POST /api/v3/external-dms/search` - Search systems
//! - `POST /api/v3/external-dms/delete` - Delete systems without content copies

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreateExternalDmsCommand, DeleteExternalDmsCommand, GetExternalDmsQuery, SearchExternalDmsQuery, UpdateExternalDmsCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn external_dms_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_external_dms).put(update_external_dms))
        .route("/get", post(get_external_dms))
        .route("/search", post(search_external_dms))
        .route("/delete", post(delete_external_dms))
}

async fn create_external_dms(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateExternalDmsCommand>,
) -> ApiResult<Response> {
    let codes = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(codes))
}

async fn update_external_dms(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateExternalDmsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_external_dms(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetExternalDmsQuery>,
) -> ApiResult<Response> {
    let systems = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(systems).into_response())
}

async fn search_external_dms(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchExternalDmsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_external_dms(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteExternalDmsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
