//! API integration tests for the openBIS server
//!
//! These drive the full router: authentication, the response envelope,
//! error codes and a few end to end flows across features.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::start().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_authentication_errors() {
    let app = TestApp::start().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v3/login",
            None,
            Some(json!({"user": "admin", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILURE");

    let (status, body) = app
        .send(Method::POST, "/api/v3/spaces/search", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_SESSION");

    let token = app.admin_token().await;
    let (status, _) = app.send(Method::POST, "/api/v3/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/api/v3/spaces/search", &token, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_space_lifecycle() {
    let app = TestApp::start().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v3/spaces",
            &token,
            json!({"creations": [{"code": "lab_a", "description": "First lab"}, {"code": "LAB_B"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"], json!(["LAB_A", "LAB_B"]));

    let (status, body) = app
        .post("/api/v3/spaces", &token, json!({"creations": [{"code": "LAB_A"}]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "USER_FAILURE");
    assert_eq!(body["error"]["message"], "Space 'LAB_A' already exists");

    let (status, body) = app
        .post(
            "/api/v3/spaces/search",
            &token,
            json!({"criteria": {"code": {"starts_with": "lab"}}, "paging": {"from": 0, "count": 1}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 2);
    assert_eq!(body["data"]["objects"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_operation_execution_round_trip() {
    let app = TestApp::start().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v3/operation-executions/execute",
            &token,
            json!({
                "operations": [
                    {"type": "CreateSpaces", "creations": [{"code": "BATCH"}]}
                ],
                "options": {"description": "from http", "execution_id": "HTTP-1"}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["type"], "synchronous");
    assert_eq!(body["data"]["execution_id"], "HTTP-1");
    assert_eq!(body["data"]["results"], json!([["BATCH"]]));

    let (status, body) = app
        .post(
            "/api/v3/operation-executions/get",
            &token,
            json!({"ids": ["HTTP-1"], "fetch_options": {"summary": true}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let execution = &body["data"]["HTTP-1"];
    assert_eq!(execution["state"], "FINISHED");
    assert_eq!(execution["description"], "from http");
    assert_eq!(execution["summary"]["operations"], json!(["CreateSpacesOperation 1 item(s)"]));
    assert!(execution.get("details").is_none());

    let (status, _) = app
        .post(
            "/api/v3/operation-executions/delete",
            &token,
            json!({"ids": ["HTTP-1"], "reason": "done"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app
        .post(
            "/api/v3/operation-executions/search",
            &token,
            json!({"criteria": {"availability": "DELETE_PENDING"}}),
        )
        .await;
    assert_eq!(body["data"]["total_count"], 1);
}

#[tokio::test]
async fn test_sql_gateway() {
    let app = TestApp::start().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v3/queries/execute-sql",
            &token,
            json!({
                "sql": "SELECT user_id FROM persons WHERE user_id = ${user}",
                "database_id": "1",
                "parameters": {"user": "admin"}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["columns"][0]["title"], "user_id");
    assert_eq!(body["data"]["rows"], json!([["admin"]]));

    let (status, body) = app
        .post(
            "/api/v3/queries/execute-sql",
            &token,
            json!({"sql": "DELETE FROM persons", "database_id": "1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "USER_FAILURE");
    let persons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(persons, 1);

    let (status, body) = app
        .post(
            "/api/v3/queries/execute-sql",
            &token,
            json!({"sql": "SELECT token_digest FROM sessions", "database_id": "1"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
    assert_eq!(body["error"]["code"], "AUTHORIZATION_FAILURE");
    assert!(body.get("data").map_or(true, |data| data.is_null()));
}
