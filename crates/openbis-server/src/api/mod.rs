//! HTTP surface: the V3 API under `/api/v3` plus a health check

pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::{features, features::AppState, middleware};

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = middleware::cors_layer(&state.config.cors);
    let api_v3 = features::router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .nest("/api/v3", api_v3)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(cors)
}

async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}
