//! Session routes
//!
//! - `POST /api/v3/login` - Exchange user and password for a session token
//! - `POST /api/v3/logout` - End the caller's session

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::LoginCommand;
use crate::{api::response::ApiResponse, auth::Caller, error::ApiResult, features::AppState};

pub fn sessions_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Log in
///
/// # Request Body
///
/// ```json
/// { "user": "admin", "password": "secret" }
/// ```
///
/// # Response
///
/// - `200 OK` - `{ "token": "admin-..." }`
/// - `401 Unauthorized` - Unknown user, wrong password or inactive person
async fn login(State(state): State<AppState>, Json(command): Json<LoginCommand>) -> ApiResult<Response> {
    let response = super::login::handle(&state.db, &state.config.session, command).await?;
    Ok(ApiResponse::success(response).into_response())
}

async fn logout(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    super::logout::handle(&state.db, &caller.session).await?;
    Ok(ApiResponse::success(()).into_response())
}
