//! Authentication integration tests.
//!
//! Tests verify:
//! - Login success and the two login failure messages
//! - Every protected route rejects missing, forged and expired tokens
//! - Raw and `Bearer` token forms
//! - User listing never exposes password hashes

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use super::test_utils::{
    delete_request, get_request, login_request, MultipartBuilder, TestApp, ALICE,
};

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(login_request("/user/login", "alice", "wonderland"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");
    assert_eq!(body["data"]["user"], "alice");

    let token = body["data"]["token"].as_str().unwrap();
    assert_eq!(app.signer.verify(token).unwrap().user, "alice");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(login_request("/user/login", "alice", "looking-glass"))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "incorrect password");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_login_unknown_user() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(login_request("/user/login", "mallory", "wonderland"))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "cannot pass");
}

#[tokio::test]
async fn test_login_malformed_body() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/user/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"alice"}"#))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");
}

// =============================================================================
// Token Checks
// =============================================================================

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let requests = vec![
        get_request("/user", None),
        get_request("/image", None),
        delete_request("/image/1", None),
        MultipartBuilder::new()
            .text("user", "alice")
            .into_request("/image", None),
    ];

    for request in requests {
        let uri = request.uri().to_string();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "route {}", uri);
        assert_eq!(body["message"], "fail token", "route {}", uri);
    }
}

#[tokio::test]
async fn test_forged_token_rejected() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    // Claim to be bob with alice's signature
    let parts: Vec<&str> = token.split('.').collect();
    let forged = format!("{}.{}.{}", hex::encode("bob"), parts[1], parts[2]);

    let (status, body) = app.send(get_request("/image", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "fail token");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = TestApp::new().await;
    let token = app.signer.issue_with_expiry("alice", 1_000);

    let (status, body) = app.send(get_request("/user", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "fail token");
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(get_request("/user", Some("not-a-token")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "fail token");
}

#[tokio::test]
async fn test_bearer_prefix_accepted() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let (status, body) = app
        .send(get_request("/user", Some(&format!("Bearer {}", token))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");
}

// =============================================================================
// Users and Health
// =============================================================================

#[tokio::test]
async fn test_list_users_excludes_password() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let (status, body) = app.send(get_request("/user", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["name"], "alice");
    assert_eq!(users[1]["name"], "bob");
    for user in users {
        assert!(user["id"].is_i64());
        assert!(user.get("password_hash").is_none());
        assert!(user.get("password").is_none());
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let (status, body) = app.send(get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}
