//! Global search API routes
//!
//! - `POST /api/v3/global-search` - Search the text index

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::GlobalSearchQuery;
use crate::{api::response::ApiResponse, auth::Caller, error::ApiResult, features::AppState};

pub fn global_search_routes() -> Router<AppState> {
    Router::new().route("/", post(search_globally))
}

async fn search_globally(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GlobalSearchQuery>,
) -> ApiResult<Response> {
    let result = super::handle(&state.index, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}
