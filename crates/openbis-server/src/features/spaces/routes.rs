//! Space API routes
//!
//! - `POST /api/v3/spaces` - Create spaces
//! - `PUT /api/v3/spaces` - Update spaces
//! - `POST /api/v3/spaces/get` - Get spaces by code
//! - `POST /api/v3/spaces/search` - Search spaces
//! - `POST /api/v3/spaces/delete` - Delete spaces

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreateSpacesCommand, DeleteSpacesCommand, GetSpacesQuery, SearchSpacesQuery, UpdateSpacesCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn spaces_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_spaces).put(update_spaces))
        .route("/get", post(get_spaces))
        .route("/search", post(search_spaces))
        .route("/delete", post(delete_spaces))
}

/// Create spaces
///
/// # Request Body
///
/// ```json
/// { "creations": [{ "code": "MY_SPACE", "description": "..." }] }
/// ```
///
/// # Response
///
/// - `201 Created` - Codes of the new spaces
/// - `400 Bad Request` - Invalid or duplicate code
/// - `403 Forbidden` - Caller is not an instance admin
async fn create_spaces(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateSpacesCommand>,
) -> ApiResult<Response> {
    let codes = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(codes))
}

async fn update_spaces(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateSpacesCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

/// Get spaces by code; unknown codes are left out of the map
async fn get_spaces(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetSpacesQuery>,
) -> ApiResult<Response> {
    let spaces = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(spaces).into_response())
}

async fn search_spaces(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchSpacesQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

/// Delete spaces
///
/// # Response
///
/// - `200 OK` - Spaces deleted, unknown codes ignored
/// - `400 Bad Request` - Missing reason, or the space is being used
/// - `403 Forbidden` - Caller is not an instance admin
async fn delete_spaces(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteSpacesCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
