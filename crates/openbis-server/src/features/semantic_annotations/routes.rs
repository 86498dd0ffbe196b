//! Person API routes
//!
//! - `POST /api/v3/semantic-annotations` - Create annotations
//! - `PUT /api/v3/semantic-annotations` - Update annotations
//! - `POST /api/v3/semantic-annotations/get` - Get annotations by perm id
//! - `POST /api/v3/semantic-annotations/search` - Search annotations
//! - `POST /api/v3/semantic-annotations/delete` - Delete annotations

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateSemanticAnnotationsCommand, DeleteSemanticAnnotationsCommand, GetSemanticAnnotationsQuery,
    SearchSemanticAnnotationsQuery, UpdateSemanticAnnotationsCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn semantic_annotations_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_annotations).put(update_annotations))
        .route("/get", post(get_annotations))
        .route("/search", post(search_annotations))
        .route("/delete", post(delete_annotations))
}

async fn create_annotations(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateSemanticAnnotationsCommand>,
) -> ApiResult<Response> {
    let perm_ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(perm_ids))
}

async fn update_annotations(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateSemanticAnnotationsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_annotations(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetSemanticAnnotationsQuery>,
) -> ApiResult<Response> {
    let annotations = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(annotations).into_response())
}

async fn search_annotations(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchSemanticAnnotationsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_annotations(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteSemanticAnnotationsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
