mod common;

use axum::http::StatusCode;
use common::{TestApp, body_json, location, login_location};
use scribbler_db::Store;

#[tokio::test]
async fn profile_lists_author_posts() {
    let app = TestApp::new();
    let (alice, _) = app.author("alice").await;
    let (bob, _) = app.author("bob").await;
    for n in 0..12 {
        app.post(&alice, &format!("alice {n}"), None).await;
    }
    app.post(&bob, "bob", None).await;

    let response = app.get("/alice/", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["author"]["username"], "alice");
    assert_eq!(json["count_posts"], 12);
    assert_eq!(json["following"], false);
    assert_eq!(json["page"]["items"].as_array().unwrap().len(), 10);
    assert_eq!(json["page"]["items"][0]["text"], "alice 11");

    let second = body_json(app.get("/alice/?page=2", None).await).await;
    assert_eq!(second["page"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_profile_is_missing() {
    let app = TestApp::new();

    assert_eq!(app.get("/nobody/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_and_unfollow() {
    let app = TestApp::new();
    let (alice, alice_token) = app.author("alice").await;
    let (bob, _) = app.author("bob").await;
    app.post(&bob, "hi from bob", None).await;

    let response = app.get("/bob/follow/", Some(&alice_token)).await;
    assert_eq!(location(&response), "/bob/");
    assert!(app.store.is_following(alice.id, bob.id).await.unwrap());

    let json = body_json(app.get("/bob/", Some(&alice_token)).await).await;
    assert_eq!(json["following"], true);
    let json = body_json(app.get("/bob/", None).await).await;
    assert_eq!(json["following"], false);

    let response = app.get("/bob/unfollow/", Some(&alice_token)).await;
    assert_eq!(location(&response), "/bob/");
    assert!(!app.store.is_following(alice.id, bob.id).await.unwrap());

    let feed = body_json(app.get("/follow/", Some(&alice_token)).await).await;
    assert_eq!(feed["page"]["count"], 0);
}

#[tokio::test]
async fn follow_is_idempotent() {
    let app = TestApp::new();
    let (alice, alice_token) = app.author("alice").await;
    let (bob, _) = app.author("bob").await;
    app.post(&bob, "only post", None).await;

    for _ in 0..3 {
        let response = app.get("/bob/follow/", Some(&alice_token)).await;
        assert_eq!(location(&response), "/bob/");
    }

    let feed = body_json(app.get("/follow/", Some(&alice_token)).await).await;
    assert_eq!(feed["page"]["count"], 1);

    app.get("/bob/unfollow/", Some(&alice_token)).await;
    assert!(!app.store.is_following(alice.id, bob.id).await.unwrap());

    let response = app.get("/bob/unfollow/", Some(&alice_token)).await;
    assert_eq!(location(&response), "/bob/");
}

#[tokio::test]
async fn self_follow_is_ignored() {
    let app = TestApp::new();
    let (alice, token) = app.author("alice").await;

    let response = app.get("/alice/follow/", Some(&token)).await;
    assert_eq!(location(&response), "/alice/");
    assert!(!app.store.is_following(alice.id, alice.id).await.unwrap());
}

#[tokio::test]
async fn follow_targets_must_exist() {
    let app = TestApp::new();
    let (_, token) = app.author("alice").await;

    let response = app.get("/nobody/follow/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/nobody/unfollow/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_requires_login() {
    let app = TestApp::new();
    let (alice, _) = app.author("alice").await;
    let (bob, _) = app.author("bob").await;

    let response = app.get("/bob/follow/", None).await;
    assert_eq!(location(&response), login_location("/bob/follow/"));

    let response = app.get("/bob/unfollow/", None).await;
    assert_eq!(location(&response), login_location("/bob/unfollow/"));

    assert!(!app.store.is_following(alice.id, bob.id).await.unwrap());
}

#[tokio::test]
async fn alice_follows_bob() {
    let app = TestApp::new();
    let (alice, alice_token) = app.author("alice").await;
    let (bob, _) = app.author("bob").await;
    app.post(&bob, "first", None).await;
    app.post(&bob, "second", None).await;
    app.post(&alice, "mine", None).await;

    app.get("/bob/follow/", Some(&alice_token)).await;

    let feed = body_json(app.get("/follow/", Some(&alice_token)).await).await;
    let texts: Vec<_> = feed["page"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["second", "first"]);

    let profile = body_json(app.get("/bob/", Some(&alice_token)).await).await;
    assert_eq!(profile["following"], true);
    assert_eq!(profile["count_posts"], 2);

    assert!(!app.store.is_following(bob.id, alice.id).await.unwrap());
}
