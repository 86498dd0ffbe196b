//! Person API routes
//!
//! - `POST /api/v3/persons` - Create persons
//! - `PUT /api/v3/persons` - Update persons
//! - `POST /api/v3/persons/get` - Get persons by user id (`me` for the caller)
//! - `POST /api/v3/persons/search` - Search persons
//! - `POST /api/v3/persons/delete` - Delete persons

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreatePersonsCommand, DeletePersonsCommand, GetPersonsQuery, SearchPersonsQuery, UpdatePersonsCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn persons_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_persons).put(update_persons))
        .route("/get", post(get_persons))
        .route("/search", post(search_persons))
        .route("/delete", post(delete_persons))
}

async fn create_persons(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreatePersonsCommand>,
) -> ApiResult<Response> {
    let user_ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(user_ids))
}

async fn update_persons(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdatePersonsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_persons(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetPersonsQuery>,
) -> ApiResult<Response> {
    let persons = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(persons).into_response())
}

async fn search_persons(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchPersonsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_persons(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeletePersonsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
