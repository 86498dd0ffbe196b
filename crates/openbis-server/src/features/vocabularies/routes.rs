//! Vocabulary API routes
//!
//! - `POST|PUT /api/v3/vocabularies`, `/get`, `/search`, `/delete`
//! - `POST|PUT /api/v3/vocabulary-terms`, `/get`, `/search`, `/delete`

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{
    CreateVocabulariesCommand, CreateVocabularyTermsCommand, DeleteVocabulariesCommand, DeleteVocabularyTermsCommand,
    GetVocabulariesQuery, GetVocabularyTermsQuery, SearchVocabulariesQuery, SearchVocabularyTermsQuery,
    UpdateVocabulariesCommand, UpdateVocabularyTermsCommand,
};
use crate::{
    api::response::{created, ApiResponse},
    auth::Caller,
    error::ApiResult,
    features::AppState,
};

pub fn vocabularies_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_vocabularies).put(update_vocabularies))
        .route("/get", post(get_vocabularies))
        .route("/search", post(search_vocabularies))
        .route("/delete", post(delete_vocabularies))
}

pub fn vocabulary_terms_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_terms).put(update_terms))
        .route("/get", post(get_terms))
        .route("/search", post(search_terms))
        .route("/delete", post(delete_terms))
}

/// Create vocabularies, optionally with their terms
///
/// ```json
/// { "creations": [{ "code": "COLORS", "terms": [{ "code": "RED" }, { "code": "BLUE", "label": "Blue" }] }] }
/// ```
async fn create_vocabularies(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateVocabulariesCommand>,
) -> ApiResult<Response> {
    let codes = super::commands::create::handle(&state.db, &caller.session, command).await?;
    Ok(created(codes))
}

async fn update_vocabularies(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateVocabulariesCommand>,
) -> ApiResult<Response> {
    super::commands::update::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_vocabularies(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetVocabulariesQuery>,
) -> ApiResult<Response> {
    let vocabularies = super::queries::get::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(vocabularies).into_response())
}

async fn search_vocabularies(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchVocabulariesQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

async fn delete_vocabularies(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteVocabulariesCommand>,
) -> ApiResult<Response> {
    super::commands::delete::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn create_terms(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<CreateVocabularyTermsCommand>,
) -> ApiResult<Response> {
    let ids = super::commands::create_terms::handle(&state.db, &caller.session, command).await?;
    Ok(created(ids))
}

async fn update_terms(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<UpdateVocabularyTermsCommand>,
) -> ApiResult<Response> {
    super::commands::update_terms::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}

async fn get_terms(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<GetVocabularyTermsQuery>,
) -> ApiResult<Response> {
    let terms = super::queries::get_terms::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(terms).into_response())
}

async fn search_terms(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<SearchVocabularyTermsQuery>,
) -> ApiResult<Response> {
    let result = super::queries::search_terms::handle(&state.db, &caller.session, query).await?;
    Ok(ApiResponse::success(result).into_response())
}

/// Delete terms, rewriting property values of used ones to their replacement
///
/// ```json
/// { "ids": [{ "vocabulary_code": "ORGANISM", "code": "RAT" }], "reason": "merged",
///   "replacements": [{ "replaced": { "vocabulary_code": "ORGANISM", "code": "RAT" },
///                      "replacement": { "vocabulary_code": "ORGANISM", "code": "HUMAN" } }] }
/// ```
async fn delete_terms(
    State(state): State<AppState>,
    caller: Caller,
    Json(command): Json<DeleteVocabularyTermsCommand>,
) -> ApiResult<Response> {
    super::commands::delete_terms::handle(&state.db, &caller.session, command).await?;
    Ok(ApiResponse::success(()).into_response())
}
