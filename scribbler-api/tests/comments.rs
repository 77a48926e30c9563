mod common;

use axum::http::StatusCode;
use common::{TestApp, body_json, location, login_location};
use scribbler_db::Store;
use serde_json::json;

#[tokio::test]
async fn viewer_adds_comment() {
    let app = TestApp::new();
    let (alice, _) = app.author("alice").await;
    let (bob, bob_token) = app.author("bob").await;
    let post = app.post(&alice, "hello", None).await;

    let response = app
        .post_json(
            &format!("/alice/{}/comment/", post.id),
            Some(&bob_token),
            &json!({ "text": " nice post " }),
        )
        .await;
    assert_eq!(location(&response), format!("/alice/{}/", post.id));

    let comments = app.store.list_comments(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "nice post");
    assert_eq!(comments[0].author, bob);

    let detail = body_json(app.get(&format!("/alice/{}/", post.id), None).await).await;
    assert_eq!(detail["comments"][0]["text"], "nice post");
    assert_eq!(detail["comments"][0]["author"]["username"], "bob");
}

#[tokio::test]
async fn comments_are_listed_oldest_first() {
    let app = TestApp::new();
    let (alice, token) = app.author("alice").await;
    let post = app.post(&alice, "hello", None).await;
    let uri = format!("/alice/{}/comment/", post.id);

    for text in ["first", "second", "third"] {
        app.post_json(&uri, Some(&token), &json!({ "text": text })).await;
    }

    let detail = body_json(app.get(&format!("/alice/{}/", post.id), None).await).await;
    let texts: Vec<_> = detail["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|comment| comment["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn anonymous_comment_is_not_created() {
    let app = TestApp::new();
    let (alice, _) = app.author("alice").await;
    let post = app.post(&alice, "hello", None).await;
    let uri = format!("/alice/{}/comment/", post.id);

    let response = app.post_json(&uri, None, &json!({ "text": "drive-by" })).await;
    assert_eq!(location(&response), login_location(&uri));
    assert!(app.store.list_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_comment_is_dropped_silently() {
    let app = TestApp::new();
    let (alice, token) = app.author("alice").await;
    let post = app.post(&alice, "hello", None).await;
    let uri = format!("/alice/{}/comment/", post.id);
    let detail = format!("/alice/{}/", post.id);

    let response = app.post_json(&uri, Some(&token), &json!({ "text": "  " })).await;
    assert_eq!(location(&response), detail);

    let response = app.post_json(&uri, Some(&token), &json!({})).await;
    assert_eq!(location(&response), detail);

    let response = app.post_raw(&uri, Some(&token), "{ broken".to_owned()).await;
    assert_eq!(location(&response), detail);

    assert!(app.store.list_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn comment_on_missing_post() {
    let app = TestApp::new();
    let (_, token) = app.author("alice").await;

    let response = app
        .post_json("/alice/987/comment/", Some(&token), &json!({ "text": "hi" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
