//! Operation execution API routes
//!
//! - `POST /api/v3/operation-executions/execute` - Run a batch of operations
//! - `PUT /api/v3/operation-executions` - Update executions
//! - `POST /api/v3/operation-executions/get` - Get executions by perm id
//! - `POST /api/v3/operation-executions/search` - Search executions
//! - `POST /api/v3/operation-executions/delete` - Flag executions for deletion

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};

use super::{
    DeleteOperationExecutionsCommand, ExecuteOperationsCommand, GetOperationExecutionsQuery,
    SearchOperationExecutionsQuery, UpdateOperationExecutionsCommand,
};
use crate::{api::response::ApiResponse, auth::Caller, error::ApiResult, features::AppState};

pub fn operation_executions_routes() -> Router<AppState> {
    Router::new()
        .route("/", put(update_operation_executions))
        .route("/execute", post(execute_operations))
        .route("/get", post(get_operation_executions))
        .route("/search", post(search_operation_executions))
        .route("/delete", post(delete_operation_executions))
}

async fn execute_operations(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<ExecuteOperationsCommand>,
) -> ApiResult<Response> {
    let results = super::commands::execute::handle(
        &state.db,
        &state.index,
        &caller.session,
        &state.config.executions,
        command,
    )
    .await?;
    Ok(ApiResponse::success(results).into_response())
}

async fn update_operation_executions(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateOperationExecutionsCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_operation_executions(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetOperationExecutionsQuery>,
) -> ApiResult<Response> {
    let found = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(found).into_response())
}

async fn search_operation_executions(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchOperationExecutionsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_operation_executions(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteOperationExecutionsCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
