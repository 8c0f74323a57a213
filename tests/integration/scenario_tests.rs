//! End-to-end flow under the `/apiv1` prefix.

use axum::http::StatusCode;

use image_vault::RouterConfig;

use super::test_utils::{
    create_test_jpeg, delete_request, get_request, jan, MultipartBuilder, TestApp, ALICE,
};

async fn prefixed_app() -> TestApp {
    TestApp::with_config(
        RouterConfig::new()
            .with_api_prefix("/apiv1")
            .with_tracing(false),
    )
    .await
}

#[tokio::test]
async fn test_login_upload_list_delete() {
    let app = prefixed_app().await;

    // Login
    let token = app.login(ALICE).await;

    // Upload a JPEG well under the size limit
    let jpeg = create_test_jpeg(32, 24);
    assert!(jpeg.len() < 4_000_000);
    let request = MultipartBuilder::new()
        .text("user", "alice")
        .text("date", &jan(10, 12, 0, 0).timestamp_millis().to_string())
        .file("image", "holiday.jpg", "image/jpeg", &jpeg)
        .into_request(&app.path("/image"), Some(&token));
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"message": "ok"}));

    // The new record is listed with a PNG key
    let (status, body) = app.list(&token, None).await;
    assert_eq!(status, StatusCode::OK);
    let images = body["data"]["dataImages"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["original_filename"], "holiday.jpg");
    let key = images[0]["storage_key"].as_str().unwrap();
    assert!(key.ends_with(".png"));
    let id = images[0]["id"].as_i64().unwrap();
    assert_eq!(key, format!("images/{}.png", id));

    // Delete as the uploader
    let (status, body) = app
        .send(delete_request(&app.path(&format!("/image/{}", id)), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");

    // Gone from the listing and from storage
    let (_, body) = app.list(&token, None).await;
    assert!(body["data"]["dataImages"].as_array().unwrap().is_empty());
    assert!(app.objects.is_empty().await);
}

#[tokio::test]
async fn test_prefix_routes() {
    let app = prefixed_app().await;
    let token = app.login(ALICE).await;

    let (status, _) = app.send(get_request("/apiv1/user", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    // Health stays at the root
    let (status, _) = app.send(get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(get_request("/apiv1/image", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
