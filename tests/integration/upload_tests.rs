//! Upload integration tests.
//!
//! Tests verify:
//! - Successful uploads store a PNG under `images/<id>.png`
//! - Failed uploads leave neither a record nor a blob behind
//! - Form validation (missing fields, bad dates, size limit, non-JPEG data)

use axum::http::StatusCode;

use image_vault::{MetadataStore, RouterConfig};

use super::test_utils::{
    create_test_jpeg, is_valid_png, jan, MultipartBuilder, TestApp, ALICE, BOB,
};

// =============================================================================
// Success
// =============================================================================

#[tokio::test]
async fn test_upload_stores_png() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let body = app.upload(&token, "alice", jan(10, 12, 0, 0)).await;
    assert_eq!(body["message"], "ok");

    let image = app.store.find_image(1).await.unwrap().unwrap();
    assert_eq!(image.storage_key.as_deref(), Some("images/1.png"));
    assert_eq!(image.uploaded_at, jan(10, 12, 0, 0));
    assert_eq!(image.original_filename, "photo.jpg");

    let (data, content_type) = app.objects.get("images/1.png").await.unwrap();
    assert!(is_valid_png(&data));
    assert_eq!(content_type, "image/png");
}

#[tokio::test]
async fn test_upload_keys_follow_record_ids() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    for hour in 0..3 {
        app.upload(&token, "alice", jan(10, hour, 0, 0)).await;
    }

    for id in 1..=3 {
        let image = app.store.find_image(id).await.unwrap().unwrap();
        let key = format!("images/{}.png", id);
        assert_eq!(image.storage_key.as_deref(), Some(key.as_str()));
        assert!(app.objects.contains(&key).await);
    }
}

#[tokio::test]
async fn test_upload_fractional_date() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let millis = jan(10, 12, 0, 0).timestamp_millis();
    let request = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", &format!("{}.6", millis))
        .file("image", "photo.jpg", "image/jpeg", &create_test_jpeg(4, 4))
        .into_request("/image", Some(&token));

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let image = app.store.find_image(1).await.unwrap().unwrap();
    assert_eq!(image.uploaded_at, jan(10, 12, 0, 0));
}

#[tokio::test]
async fn test_upload_owner_defaults_to_caller() {
    let app = TestApp::new().await;
    let token = app.login(BOB).await;

    let request = MultipartBuilder::new()
        .text("date", &jan(10, 12, 0, 0).timestamp_millis().to_string())
        .file("image", "photo.jpg", "image/jpeg", &create_test_jpeg(4, 4))
        .into_request("/image", Some(&token));

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let bob = app.store.find_user_by_name("bob").await.unwrap().unwrap();
    let image = app.store.find_image(1).await.unwrap().unwrap();
    assert_eq!(image.owner_id, bob.id);
}

#[tokio::test]
async fn test_upload_user_field_names_owner() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let body = app.upload(&token, "bob", jan(10, 12, 0, 0)).await;
    assert_eq!(body["message"], "ok");

    let bob = app.store.find_user_by_name("bob").await.unwrap().unwrap();
    let image = app.store.find_image(1).await.unwrap().unwrap();
    assert_eq!(image.owner_id, bob.id);
}

// =============================================================================
// Compensation
// =============================================================================

#[tokio::test]
async fn test_upload_failure_leaves_no_record() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;
    app.objects.set_fail_puts(true);

    let request = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", &jan(10, 12, 0, 0).timestamp_millis().to_string())
        .file("image", "photo.jpg", "image/jpeg", &create_test_jpeg(4, 4))
        .into_request("/image", Some(&token));

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");

    assert_eq!(app.objects.put_count(), 1);
    assert!(app.store.find_image(1).await.unwrap().is_none());
    assert!(app.objects.is_empty().await);

    let (_, listing) = app.list(&token, None).await;
    assert_eq!(listing["data"]["dataImages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_non_jpeg_rejected() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let request = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", &jan(10, 12, 0, 0).timestamp_millis().to_string())
        .file("image", "notes.jpg", "image/jpeg", b"plain text, not an image")
        .into_request("/image", Some(&token));

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");

    assert!(app.store.find_image(1).await.unwrap().is_none());
    assert_eq!(app.objects.put_count(), 0);
}

#[tokio::test]
async fn test_upload_unknown_owner() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let request = MultipartBuilder::new()
        .text("user", "mallory")
        .text("date", &jan(10, 12, 0, 0).timestamp_millis().to_string())
        .file("image", "photo.jpg", "image/jpeg", &create_test_jpeg(4, 4))
        .into_request("/image", Some(&token));

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");
    assert!(app.store.find_image(1).await.unwrap().is_none());
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_upload_missing_fields() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let no_image = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", "1736510400000")
        .into_request("/image", Some(&token));
    let no_date = MultipartBuilder::new()
        .text("user", "alice")
        .file("image", "photo.jpg", "image/jpeg", &create_test_jpeg(4, 4))
        .into_request("/image", Some(&token));

    for request in [no_image, no_date] {
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "server error");
    }
    assert_eq!(app.objects.put_count(), 0);
}

#[tokio::test]
async fn test_upload_invalid_date() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let request = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", "last tuesday")
        .file("image", "photo.jpg", "image/jpeg", &create_test_jpeg(4, 4))
        .into_request("/image", Some(&token));

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.store.find_image(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_size_limit() {
    let jpeg = create_test_jpeg(64, 64);
    let app = TestApp::with_config(
        RouterConfig::new()
            .with_tracing(false)
            .with_max_upload_bytes(jpeg.len() - 1),
    )
    .await;
    let token = app.login(ALICE).await;

    let request = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", "1736510400000")
        .file("image", "photo.jpg", "image/jpeg", &jpeg)
        .into_request("/image", Some(&token));

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");
    assert_eq!(app.objects.put_count(), 0);
}

#[tokio::test]
async fn test_upload_not_multipart() {
    let app = TestApp::new().await;
    let token = app.login(ALICE).await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/image")
        .header(axum::http::header::AUTHORIZATION, token.as_str())
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");
}
