//! Deletion API routes
//!
//! - `POST /api/v3/deletions/search` - Search deletions
//! - `POST /api/v3/deletions/confirm` - Purge trashed objects for good
//! - `POST /api/v3/deletions/revert` - Restore trashed objects

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{ConfirmDeletionsCommand, RevertDeletionsCommand, SearchDeletionsQuery};
use crate::{api::response::ApiResponse, auth::Caller, error::ApiResult, features::AppState};

pub fn deletions_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search_deletions))
        .route("/confirm", post(confirm_deletions))
        .route("/revert", post(revert_deletions))
}

async fn search_deletions(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchDeletionsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn confirm_deletions(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<ConfirmDeletionsCommand>,
) -> ApiResult<Response> {
    super::commands::confirm::handle(&state.db, &caller.session, command).await?;
    state.index.notify();
    Ok(ApiResponse::success(()).into_response())
}

async fn revert_deletions(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<RevertDeletionsCommand>,
) -> ApiResult<Response> {
    super::commands::revert::handle(&state.db, &caller.session, command).await?;
    state.index.notify();
    Ok(ApiResponse::success(()).into_response())
}
