//! Listing integration tests.
//!
//! Tests verify:
//! - Date bounds (whole `to` day included, next day excluded)
//! - Owner filter including the all-owners sentinel
//! - Hourly counts on the shifted clock and per-owner counts
//! - Record shape and display timestamps

use std::collections::HashSet;

use axum::http::StatusCode;
use serde_json::Value;

use super::test_utils::{jan, TestApp, ALICE, BOB};

fn uploaded_at_set(body: &Value) -> HashSet<String> {
    body["data"]["dataImages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|image| image["uploaded_at"].as_str().unwrap().to_string())
        .collect()
}

fn sorted_by(values: &Value, key: &str) -> Vec<Value> {
    let mut values = values.as_array().unwrap().clone();
    values.sort_by_key(|v| v[key].as_i64().unwrap());
    values
}

// =============================================================================
// Filters
// =============================================================================

#[tokio::test]
async fn test_single_day_filter_bounds() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    app.upload(&token, "alice", jan(9, 23, 59, 59)).await;
    app.upload(&token, "alice", jan(10, 0, 0, 0)).await;
    app.upload(&token, "alice", jan(10, 23, 59, 30)).await;
    app.upload(&token, "alice", jan(11, 0, 0, 0)).await;

    let (status, body) = app
        .list(&token, Some(r#"{"from":"2025-01-10","to":"2025-01-10"}"#))
        .await;
    assert_eq!(status, StatusCode::OK);

    let expected: HashSet<String> = ["2025-01-10T00:00:00Z", "2025-01-10T23:59:30Z"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(uploaded_at_set(&body), expected);
}

#[tokio::test]
async fn test_open_ended_filters() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    app.upload(&token, "alice", jan(9, 12, 0, 0)).await;
    app.upload(&token, "alice", jan(10, 12, 0, 0)).await;
    app.upload(&token, "alice", jan(11, 12, 0, 0)).await;

    let (_, body) = app.list(&token, Some(r#"{"from":"2025-01-10"}"#)).await;
    assert_eq!(body["data"]["dataImages"].as_array().unwrap().len(), 2);

    let (_, body) = app.list(&token, Some(r#"{"to":"2025-01-10"}"#)).await;
    assert_eq!(body["data"]["dataImages"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .list(&token, Some(r#"{"from":"","to":"","user_id":"0"}"#))
        .await;
    assert_eq!(body["data"]["dataImages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_owner_filter() {
    let app = TestApp::new().await;
    let alice = app.login(ALICE).await;
    let bob = app.login(BOB).await;

    app.upload(&alice, "alice", jan(10, 12, 0, 0)).await;
    app.upload(&bob, "bob", jan(10, 13, 0, 0)).await;
    app.upload(&bob, "bob", jan(10, 14, 0, 0)).await;

    for filter in [r#"{"user_id":"2"}"#, r#"{"user_id":2}"#] {
        let (status, body) = app.list(&alice, Some(filter)).await;
        assert_eq!(status, StatusCode::OK);

        let images = body["data"]["dataImages"].as_array().unwrap();
        assert_eq!(images.len(), 2, "filter {}", filter);
        assert!(images.iter().all(|i| i["user"]["name"] == "bob"));

        let owners = body["data"]["countImagesByUsers"].as_array().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0]["user"], "bob");
    }

    for filter in [r#"{"user_id":"0"}"#, r#"{"user_id":0}"#] {
        let (_, body) = app.list(&alice, Some(filter)).await;
        assert_eq!(body["data"]["dataImages"].as_array().unwrap().len(), 3);
    }
}

#[tokio::test]
async fn test_bad_filters() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    for filter in [
        "{not json",
        r#"{"from":"2025/01/10"}"#,
        r#"{"to":"2025-13-01"}"#,
        r#"{"user_id":"alice"}"#,
    ] {
        let (status, body) = app.list(&token, Some(filter)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "filter {}", filter);
        assert_eq!(body["message"], "server error");
    }
}

// =============================================================================
// Aggregations
// =============================================================================

#[tokio::test]
async fn test_hourly_counts_on_shifted_clock() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    // 06:xx and 07:xx UTC are hours 1 and 2 on the UTC-5 clock
    app.upload(&token, "alice", jan(10, 6, 10, 0)).await;
    app.upload(&token, "alice", jan(10, 6, 40, 0)).await;
    app.upload(&token, "alice", jan(10, 7, 15, 0)).await;

    let (_, body) = app.list(&token, None).await;
    let hours = sorted_by(&body["data"]["countImages"], "hour");

    assert_eq!(
        hours,
        vec![
            serde_json::json!({"hour": 1, "totalImages": 2}),
            serde_json::json!({"hour": 2, "totalImages": 1}),
        ]
    );
}

#[tokio::test]
async fn test_owner_counts() {
    let app = TestApp::new().await;
    let alice = app.login(ALICE).await;
    let bob = app.login(BOB).await;

    for hour in 0..3 {
        app.upload(&alice, "alice", jan(10, hour, 0, 0)).await;
    }
    for hour in 0..2 {
        app.upload(&bob, "bob", jan(10, hour, 30, 0)).await;
    }

    let (_, body) = app.list(&alice, None).await;
    let owners = sorted_by(&body["data"]["countImagesByUsers"], "user_id");

    assert_eq!(
        owners,
        vec![
            serde_json::json!({"user_id": 1, "totalImages": 3, "user": "alice"}),
            serde_json::json!({"user_id": 2, "totalImages": 2, "user": "bob"}),
        ]
    );
}

#[tokio::test]
async fn test_empty_listing() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let (status, body) = app.list(&token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");
    assert_eq!(body["data"]["dataImages"], serde_json::json!([]));
    assert_eq!(body["data"]["countImages"], serde_json::json!([]));
    assert_eq!(body["data"]["countImagesByUsers"], serde_json::json!([]));
}

// =============================================================================
// Record Shape
// =============================================================================

#[tokio::test]
async fn test_record_shape() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;
    app.upload(&token, "alice", jan(10, 12, 0, 0)).await;

    let (_, body) = app.list(&token, None).await;
    let image = &body["data"]["dataImages"][0];

    assert_eq!(image["id"], 1);
    assert_eq!(image["storage_key"], "images/1.png");
    assert_eq!(image["original_filename"], "photo.jpg");
    assert_eq!(image["uploaded_at"], "2025-01-10T12:00:00Z");
    assert_eq!(image["display_date"], "2025-01-10 07:00:00");
    assert_eq!(image["user"], serde_json::json!({"name": "alice"}));
}
