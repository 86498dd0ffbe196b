//! Entity type routes, mounted once per kind
//!
//! - `POST /api/v3/{kind}-types` - Create types
//! - `PUT /api/v3/{kind}-types` - Update types
//! - `POST /api/v3/{kind}-types/get` - Get types by code
//! - `POST /api/v3/{kind}-types/search` - Search types
//! - `POST /api/v3/{kind}-types/delete` - Delete unused types

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    commands::{CreateEntityTypesCommand, DeleteEntityTypesCommand, UpdateEntityTypesCommand},
    queries::{GetEntityTypesQuery, SearchEntityTypesQuery},
    EntityKindSpec,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn entity_type_routes<S: EntityKindSpec>() -> Router<AppState> {
    Router::new()
        .route("/", post(create_types::<S>).put(update_types::<S>))
        .route("/get", post(get_types::<S>))
        .route("/search", post(search_types::<S>))
        .route("/delete", post(delete_types::<S>))
}

/// Create entity types of kind `S`
///
/// Kind specific attributes sit next to the common fields:
///
/// ```json
/// { "creations": [{ "code": "PLATE", "auto_generated_code": true, "generated_code_prefix": "PL",
///                   "property_assignments": [{ "property_type_id": "DESCRIPTION" }] }] }
/// ```
async fn create_types<S: EntityKindSpec>(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateEntityTypesCommand<S::Attributes>>,
) -> ApiResult<Response> {
    let codes = super::commands::create::handle::<S>(&state.db, &caller.session, command).await?;
    Ok(created(codes))
}

async fn update_types<S: EntityKindSpec>(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateEntityTypesCommand<S::Attributes>>,
) -> ApiResult<Response> {
    super::commands::update::handle::<S>(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_types<S: EntityKindSpec>(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetEntityTypesQuery>,
) -> ApiResult<Response> {
    let types = super::queries::get::handle::<S>(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(types).into_response())
}

async fn search_types<S: EntityKindSpec>(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchEntityTypesQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle::<S>(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

/// Delete entity types
///
/// # Response
///
/// - `200 OK` - Types deleted, unknown codes ignored
/// - `400 Bad Request` - Missing reason, or a type is being used
/// - `403 Forbidden` - Caller is not an instance admin
async fn delete_types<S: EntityKindSpec>(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteEntityTypesCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle::<S>(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
