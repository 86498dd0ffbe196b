//! Query API routes
//!
//! - `POST /api/v3/queries` - Create stored queries
//! - `PUT /api/v3/queries` - Update stored queries
//! - `POST /api/v3/queries/get` - Get queries by technical id
//! - `POST /api/v3/queries/search` - Search visible queries
//! - `POST /api/v3/queries/delete` - Delete queries
//! - `POST /api/v3/queries/execute` - Run a stored query
//! - `POST /api/v3/queries/execute-sql` - Run an ad hoc select statement
//! - `GET /api/v3/queries/databases` - Query databases open to the caller

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    CreateQueriesCommand, DeleteQueriesCommand, ExecuteQueryCommand, ExecuteSqlCommand, GetQueriesQuery,
    SearchQueriesQuery, UpdateQueriesCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn queries_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_queries).put(update_queries))
        .route("/get", post(get_queries))
        .route("/search", post(search_queries))
        .route("/delete", post(delete_queries))
        .route("/execute", post(execute_query))
        .route("/execute-sql", post(execute_sql))
        .route("/databases", get(list_databases))
}

async fn create_queries(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateQueriesCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create::handle(&state.db, &caller.session, &state.query_databases, command).await?;
    Ok(created(ids))
}

async fn update_queries(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateQueriesCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, &state.query_databases, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_queries(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetQueriesQuery>,
) -> ApiResult<Response> {
    let found = super::queries::get::handle(&state.db, &caller.session, &state.query_databases, query).await?;
    Ok(ApiResponse::success(found).into_response())
}

async fn search_queries(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchQueriesQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, &state.query_databases, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_queries(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteQueriesCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn execute_query(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<ExecuteQueryCommand>,
) -> ApiResult<Response> {
    let model =
        super::queries::execute::execute_query(&state.db, &caller.session, &state.query_databases, command).await?;
    Ok(ApiResponse::success(model).into_response())
}

async fn execute_sql(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<ExecuteSqlCommand>,
) -> ApiResult<Response> {
    let model =
        super::queries::execute::execute_sql(&state.db, &caller.session, &state.query_databases, command).await?;
    Ok(ApiResponse::success(model).into_response())
}

async fn list_databases(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    let databases = super::databases::list(&state.db, &caller.session, &state.query_databases).await?;
    Ok(ApiResponse::success(databases).into_response())
}
