//! Property type API routes
//!
//! - `POST /api/v3/property-types` - Create property types
//! - `PUT /api/v3/property-types` - Update property types
//! - `POST /api/v3/property-types/get` - Get property types by code
//! - `POST /api/v3/property-types/search` - Search property types
//! - `POST /api/v3/property-types/delete` - Delete unassigned property types

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreatePropertyTypesCommand, DeletePropertyTypesCommand, GetPropertyTypesQuery, SearchPropertyTypesQuery, UpdatePropertyTypesCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn property_types_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_property_types).put(update_property_types))
        .route("/get", post(get_property_types))
        .route("/search", post(search_property_types))
        .route("/delete", post(delete_property_types))
}

async fn create_property_types(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreatePropertyTypesCommand>,
) -> ApiResult<Response> {
    let codes = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(codes))
}

async fn update_property_types(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdatePropertyTypesCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_property_types(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetPropertyTypesQuery>,
) -> ApiResult<Response> {
    let types = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(types).into_response())
}

async fn search_property_types(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchPropertyTypesQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_property_types(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeletePropertyTypesCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
