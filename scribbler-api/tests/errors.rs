mod common;

use axum::http::StatusCode;
use base64::{Engine, prelude::BASE64_STANDARD};
use common::{GIF, TestApp, body_json};
use scribbler_db::{PostFilter, Store};
use serde_json::json;

#[tokio::test]
async fn unknown_route_renders_not_found() {
    let app = TestApp::new();

    let response = app.get("/this/route/does/not/exist/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["status"], 404);
    assert!(json["detail"].as_str().unwrap().contains("/this/route/does/not/exist/"));
}

#[tokio::test]
async fn missing_resources_render_not_found() {
    let app = TestApp::new();

    for uri in ["/nobody/", "/group/none/", "/nobody/1/", "/nobody/x/"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["status"], 404);
        assert!(json["detail"].is_string());
    }
}

#[tokio::test]
async fn internal_failures_render_opaque_error() {
    let app = TestApp::with_broken_media();
    let (_, token) = app.author("alice").await;

    let image = json!({ "name": "small.gif", "content": BASE64_STANDARD.encode(GIF) });
    let response = app
        .post_json("/new/", Some(&token), &json!({ "text": "pic", "image": image }))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json, json!({ "status": 500 }));
    assert_eq!(app.store.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_post_body_is_bad_request() {
    let app = TestApp::new();
    let (_, token) = app.author("alice").await;

    let response = app.post_raw("/new/", Some(&token), "[1, 2".to_owned()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], 400);
}

#[tokio::test]
async fn about_pages_are_public() {
    let app = TestApp::new();

    for uri in ["/about/author/", "/about/tech/"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");

        let json = body_json(response).await;
        assert!(json["title"].is_string());
    }
}
