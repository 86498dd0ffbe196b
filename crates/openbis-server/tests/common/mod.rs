//! Common utilities for openBIS server integration tests
//!
//! Every test gets its own in-memory database with the schema applied, an
//! instance admin account and a running index worker.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use openbis_server::{
    api,
    config::Config,
    db,
    features::{queries::QueryDatabases, AppState},
    index::IndexSync,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::ServiceExt;

pub const ADMIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "secret";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    _worker: DropGuard,
}

impl TestApp {
    pub async fn start() -> Self {
        let pool = db::connect_in_memory().await.expect("in-memory database");
        db::migrate(&pool).await.expect("migrations");
        db::bootstrap_admin(&pool, ADMIN, ADMIN_PASSWORD).await.expect("admin account");

        let config = Arc::new(Config::default());
        let index = IndexSync::new();
        let cancel = CancellationToken::new();
        index.spawn_worker(pool.clone(), Duration::from_millis(20), cancel.clone());

        let state = AppState {
            db: pool.clone(),
            query_databases: QueryDatabases::metadata_only(pool.clone(), &config),
            config,
            index,
        };

        Self {
            router: api::create_router(state),
            pool,
            _worker: cancel.drop_guard(),
        }
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn login(&self, user: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v3/login",
                None,
                Some(json!({"user": user, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN, ADMIN_PASSWORD).await
    }
}
