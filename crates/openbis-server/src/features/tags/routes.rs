//! Tag API routes
//!
//! - `POST /api/v3/tags` - Create tags owned by the caller
//! - `PUT /api/v3/tags` - Update tags
//! - `POST /api/v3/tags/get` - Get tags by perm id or code
//! - `POST /api/v3/tags/search` - Search visible tags
//! - `POST /api/v3/tags/delete` - Delete tags

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{CreateTagsCommand, DeleteTagsCommand, GetTagsQuery, SearchTagsQuery, UpdateTagsCommand};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn tags_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_tags).put(update_tags))
        .route("/get", post(get_tags))
        .route("/search", post(search_tags))
        .route("/delete", post(delete_tags))
}

async fn create_tags(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateTagsCommand>,
) -> ApiResult<Response> {
    let perm_ids = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(perm_ids))
}

async fn update_tags(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateTagsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_tags(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetTagsQuery>,
) -> ApiResult<Response> {
    let tags = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(tags).into_response())
}

async fn search_tags(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchTagsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_tags(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteTagsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
